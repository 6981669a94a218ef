//! End-to-end validation and query tests against the files in
//! `tests/fixtures/`.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use xmlvalidator::validation::CollectingHandler;
use xmlvalidator::{
    evaluate, rewrite_doctype, validate, validate_with_handler, DtdSource, Error, ValidatedDocument,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn root_name(doc: &ValidatedDocument) -> String {
    doc.qualified_name(doc.root_element().unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_embedded_dtd() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    assert_eq!(root_name(&doc), "bookstore");
    assert_eq!(doc.dtd_source(), &DtdSource::Embedded);
}

#[test]
fn test_doctype_system_relative_to_document() {
    let doc = validate(&fixture("valid2.xml"), None).unwrap();
    assert_eq!(root_name(&doc), "bookstore");
}

#[test]
fn test_no_doctype_needs_only_well_formedness() {
    let doc = validate(&fixture("valid_nodtd.xml"), None).unwrap();
    assert_eq!(doc.dtd_source(), &DtdSource::None);
}

#[test]
fn test_external_dtd_for_every_fixture_shape() {
    let dtd = fixture("test.dtd");
    for name in ["valid.xml", "valid2.xml", "valid_nodtd.xml"] {
        let doc = validate(&fixture(name), Some(&dtd))
            .unwrap_or_else(|e| panic!("{name} should validate against test.dtd: {e}"));
        assert_eq!(root_name(&doc), "bookstore", "{name}");
        assert_eq!(doc.dtd_source(), &DtdSource::External(dtd.clone()));
    }
}

#[test]
fn test_invalid_fails_with_embedded_or_external_dtd() {
    let embedded = validate(&fixture("invalid.xml"), None).unwrap_err();
    assert!(matches!(embedded, Error::Invalid(_)), "{embedded}");
    assert_eq!(embedded.location().map(|l| l.line), Some(12));

    let external = validate(&fixture("invalid.xml"), Some(&fixture("test.dtd"))).unwrap_err();
    assert!(matches!(external, Error::Invalid(_)), "{external}");
}

#[test]
fn test_default_attributes_applied() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    let langs = evaluate(&doc, "//title/@lang").unwrap();
    assert_eq!(langs.texts(), vec!["it", "en", "en"]);
}

#[test]
fn test_missing_dtd_file() {
    let err =
        validate(&fixture("valid_nodtd.xml"), Some(Path::new("no/such/file.dtd"))).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
    assert!(err.to_string().contains("no/such/file.dtd"), "{err}");
}

#[test]
fn test_missing_xml_file() {
    let err = validate(&fixture("absent.xml"), None).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
}

#[test]
fn test_rewrite_then_validate_matches_embedded() {
    let dir = tempfile::tempdir().unwrap();
    let dtd = fixture("test.dtd");

    let rewritten = rewrite_doctype(&fixture("valid_nodtd.xml"), &dtd).unwrap();
    assert!(rewritten
        .starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE bookstore SYSTEM "));

    let copy = dir.path().join("embedded.xml");
    fs::write(&copy, &rewritten).unwrap();
    let via_copy = validate(&copy, None).unwrap();
    let via_override = validate(&fixture("valid_nodtd.xml"), Some(&dtd)).unwrap();

    let titles = |doc: &ValidatedDocument| evaluate(doc, "//title | //@*").unwrap().texts();
    assert_eq!(titles(&via_copy), titles(&via_override));
}

#[test]
fn test_warnings_escalate_unless_collected() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("warn.xml");
    fs::write(
        &xml,
        "<!DOCTYPE r [\n<!ELEMENT r (#PCDATA)>\n<!ATTLIST unused a CDATA #IMPLIED>\n]>\n<r/>",
    )
    .unwrap();

    let err = validate(&xml, None).unwrap_err();
    assert!(err.to_string().contains("validity warning"), "{err}");

    let mut handler = CollectingHandler::default();
    validate_with_handler(&xml, None, &mut handler).unwrap();
    assert_eq!(handler.warnings.len(), 1);
    assert!(handler.errors.is_empty());
}

#[test]
fn test_external_parameter_entities_and_conditional_sections() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("common.ent"),
        "<!ENTITY % inline \"#PCDATA | em\">\n<!ELEMENT em (#PCDATA)>\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("doc.dtd"),
        "<!ENTITY % common SYSTEM \"common.ent\">\n%common;\n\
         <!ENTITY % strict \"INCLUDE\">\n\
         <![%strict;[<!ELEMENT doc (p+)>]]>\n\
         <![IGNORE[<!ELEMENT doc ANY>]]>\n\
         <!ELEMENT p (%inline;)*>\n",
    )
    .unwrap();
    let xml = dir.path().join("doc.xml");
    fs::write(
        &xml,
        "<!DOCTYPE doc SYSTEM \"doc.dtd\"><doc><p>a <em>b</em></p></doc>",
    )
    .unwrap();
    assert!(validate(&xml, None).is_ok());

    let bad = dir.path().join("bad.xml");
    fs::write(&bad, "<!DOCTYPE doc SYSTEM \"doc.dtd\"><doc/>").unwrap();
    assert!(matches!(validate(&bad, None), Err(Error::Invalid(_))));
}

#[test]
fn test_internal_subset_takes_precedence() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("ext.dtd"),
        "<!ELEMENT r (#PCDATA)>\n<!ENTITY who \"external\">\n<!ATTLIST r v CDATA \"ext\">\n",
    )
    .unwrap();
    let xml = dir.path().join("doc.xml");
    fs::write(
        &xml,
        "<!DOCTYPE r SYSTEM \"ext.dtd\" [<!ENTITY who \"internal\"><!ATTLIST r v CDATA \"int\">]><r>&who;</r>",
    )
    .unwrap();
    let doc = validate(&xml, None).unwrap();
    assert_eq!(evaluate(&doc, "/r").unwrap().texts(), vec!["internal"]);
    assert_eq!(evaluate(&doc, "/r/@v").unwrap().texts(), vec!["int"]);
}

#[test]
fn test_utf16_document() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("utf16.xml");
    let text = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><r>caf\u{e9}</r>";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(&xml, bytes).unwrap();
    let doc = validate(&xml, None).unwrap();
    assert_eq!(evaluate(&doc, "/r").unwrap().texts(), vec!["caf\u{e9}"]);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn test_titles_in_document_order() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    let titles = evaluate(&doc, "//bookstore/book/title").unwrap();
    assert_eq!(
        titles.texts(),
        vec!["Everyday Italian", "Harry Potter", "Learning XML"]
    );
    let again = evaluate(&doc, "//bookstore/book/title").unwrap();
    assert_eq!(again.texts(), titles.texts());
}

#[test]
fn test_id_function_uses_dtd_ids() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    let found = evaluate(&doc, "id('b0003 b0001')/title").unwrap();
    assert_eq!(found.texts(), vec!["Everyday Italian", "Learning XML"]);
}

#[test]
fn test_empty_result() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    assert!(evaluate(&doc, "//magazine").unwrap().is_empty());
}

#[test]
fn test_malformed_expression_fails_identifiably() {
    let doc = validate(&fixture("valid.xml"), None).unwrap();
    let err = evaluate(&doc, "invalid\\xpath").unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert!(err.to_string().contains("illegal"), "{err}");
}
