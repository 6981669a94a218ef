#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlvalidator::parser::{parse_str_with_options, ParseOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // External subset skipped; the fuzzer must not touch the file system.
        let opts = ParseOptions::default().load_external_dtd(false);
        let _ = parse_str_with_options(s, &opts);
        let _ = parse_str_with_options(s, &opts.namespaces(false));
    }
});
