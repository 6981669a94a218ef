#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlvalidator::tree::Document;
use xmlvalidator::xpath::evaluate;

fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        if let Ok(doc) = Document::parse_str(
            "<!DOCTYPE root [<!ATTLIST child attr ID #IMPLIED>]>\
             <root xmlns:p=\"urn:p\"><child attr=\"val\">text</child><p:x/><!--c--><?pi d?></root>",
        ) {
            if let Some(root) = doc.root_element() {
                // XPath evaluation should never panic on any expression
                let _ = evaluate(&doc, root, expr);
            }
        }
    }
});
