#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlvalidator::parser::{parse_str_with_options, ParseOptions};
use xmlvalidator::serial::{serialize_with_options, SerializeOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let opts = ParseOptions::default().load_external_dtd(false);
        // A rewritten DOCTYPE must still parse whenever the input did.
        if let Ok(doc) = parse_str_with_options(s, &opts) {
            let output =
                serialize_with_options(&doc, &SerializeOptions::default().doctype_system("x.dtd"));
            assert!(parse_str_with_options(&output, &opts).is_ok(), "{output}");
        }
    }
});
