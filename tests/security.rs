//! Security-focused tests for xmlvalidator.
//!
//! These tests verify that validation rejects malicious or pathological
//! inputs that could cause denial of service (`DoS`) via excessive resource
//! consumption, and that external resources are only read from where the
//! caller allows.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use xmlvalidator::parser::{parse_str_with_options, ParseOptions};
use xmlvalidator::resolver::{ExternalEntity, ExternalEntityRequest, ResolveError};
use xmlvalidator::{evaluate, validate, Error, Validator, ValidatorOptions};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Depth limit tests
// ---------------------------------------------------------------------------

#[test]
fn test_deeply_nested_elements_rejected() {
    // 300 levels is beyond the default limit of 256. A larger stack keeps
    // debug builds from overflowing before the limit is reached.
    let result = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let dir = tempfile::tempdir().unwrap();
            let xml = format!("{}{}", "<a>".repeat(300), "</a>".repeat(300));
            let path = write(dir.path(), "deep.xml", &xml);
            validate(&path, None).map(|_| ()).map_err(|e| e.to_string())
        })
        .unwrap()
        .join()
        .unwrap();
    let err = result.unwrap_err();
    assert!(err.contains("maximum nesting depth"), "{err}");
}

#[test]
fn test_depth_limit_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "five.xml", "<a><b><c><d><e/></d></c></b></a>");

    let loose = Validator::new(ValidatorOptions::default().max_depth(5));
    assert!(loose.validate(&path, None).is_ok());

    let tight = Validator::new(ValidatorOptions::default().max_depth(4));
    let err = tight.validate(&path, None).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
}

#[test]
fn test_deeply_nested_content_model_rejected() {
    let result = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let dir = tempfile::tempdir().unwrap();
            let model = format!("{}a{}", "(".repeat(20_000), ")".repeat(20_000));
            let xml = format!("<!DOCTYPE r [<!ELEMENT r {model}>]><r/>");
            let path = write(dir.path(), "model.xml", &xml);
            match validate(&path, None) {
                Err(Error::Parse(err)) => Ok(err.to_string()),
                other => Err(format!("{:?}", other.map(|_| ()))),
            }
        })
        .unwrap()
        .join()
        .unwrap();
    let message = result.unwrap();
    assert!(message.contains("content model nested deeper"), "{message}");
}

#[test]
fn test_content_model_depth_follows_max_depth() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "groups.xml",
        "<!DOCTYPE r [<!ELEMENT r (((a)))><!ELEMENT a EMPTY>]><r><a/></r>",
    );

    let loose = Validator::new(ValidatorOptions::default().max_depth(3));
    assert!(loose.validate(&path, None).is_ok());

    let tight = Validator::new(ValidatorOptions::default().max_depth(2));
    let err = tight.validate(&path, None).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
}

#[test]
fn test_deeply_nested_xpath_rejected() {
    let result = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = write(dir.path(), "r.xml", "<r/>");
            let doc = validate(&path, None).unwrap();
            let nested = |open: &str, close: &str| {
                format!("{}1{}", open.repeat(2000), close.repeat(2000))
            };
            [
                nested("(", ")"),
                nested("count(", ")"),
                nested("r[", "]"),
                format!("{}1", "-".repeat(2000)),
                format!("1{}", " + 1".repeat(2000)),
            ]
            .iter()
            .map(|xpath| match evaluate(&doc, xpath) {
                Err(Error::Query(err)) => Ok(err.to_string()),
                other => Err(format!("{:?}", other.map(|r| r.len()))),
            })
            .collect::<Vec<_>>()
        })
        .unwrap()
        .join()
        .unwrap();
    for message in result {
        let message = message.unwrap();
        assert!(message.contains("nested too deeply"), "{message}");
    }
}

// ---------------------------------------------------------------------------
// Entity expansion tests
// ---------------------------------------------------------------------------

const BILLION_LAUGHS: &str = r#"<?xml version="1.0"?>
<!DOCTYPE lolz [
<!ENTITY lol "lol">
<!ENTITY lol1 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">
<!ENTITY lol2 "&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;">
<!ENTITY lol3 "&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;">
<!ENTITY lol4 "&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;">
<!ENTITY lol5 "&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;">
<!ENTITY lol6 "&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;">
<!ENTITY lol7 "&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;">
<!ENTITY lol8 "&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;">
<!ENTITY lol9 "&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;">
]>
<lolz>&lol9;</lolz>"#;

#[test]
fn test_billion_laughs_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "lolz.xml", BILLION_LAUGHS);
    let err = validate(&path, None).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
    assert!(err.to_string().contains("entity expansion limit"), "{err}");
}

#[test]
fn test_billion_laughs_rejected_when_rewriting() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "lolz.xml", BILLION_LAUGHS);
    let dtd = write(dir.path(), "any.dtd", "<!ELEMENT lolz (#PCDATA)>");
    let err = validate(&path, Some(&dtd)).unwrap_err();
    assert!(matches!(err, Error::Rewrite { .. }), "{err}");
}

#[test]
fn test_expansion_limit_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "few.xml",
        "<!DOCTYPE r [<!ENTITY e \"x\">]><r>&e;&e;&e;</r>",
    );
    let tight = Validator::new(ValidatorOptions::default().max_entity_expansions(2));
    assert!(tight.validate(&path, None).is_err());
    let loose = Validator::new(ValidatorOptions::default().max_entity_expansions(3));
    assert!(loose.validate(&path, None).is_ok());
}

#[test]
fn test_recursive_entity_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "loop.xml",
        "<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>",
    );
    assert!(matches!(validate(&path, None), Err(Error::Parse(_))));
}

// ---------------------------------------------------------------------------
// Attribute and name limits
// ---------------------------------------------------------------------------

#[test]
fn test_attribute_count_limit() {
    let many: String = (0..10).map(|i| format!(" a{i}='{i}'")).collect();
    let xml = format!("<r{many}/>");
    let opts = ParseOptions::default().max_attributes(9);
    assert!(parse_str_with_options(&xml, &opts).is_err());
    let opts = ParseOptions::default().max_attributes(10);
    assert!(parse_str_with_options(&xml, &opts).is_ok());
}

#[test]
fn test_name_length_limit() {
    let name = "n".repeat(100);
    let xml = format!("<{name}/>");
    let opts = ParseOptions::default().max_name_length(50);
    assert!(parse_str_with_options(&xml, &opts).is_err());
    assert!(parse_str_with_options(&xml, &ParseOptions::default()).is_ok());
}

// ---------------------------------------------------------------------------
// External resources
// ---------------------------------------------------------------------------

#[test]
fn test_remote_dtd_not_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "remote.xml",
        "<!DOCTYPE r SYSTEM \"http://example.com/r.dtd\"><r/>",
    );
    let err = validate(&path, None).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
    assert!(err.to_string().contains("unsupported system identifier"), "{err}");
}

#[test]
fn test_custom_resolver_can_deny_external_entities() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "secret.txt", "top secret");
    let path = write(
        dir.path(),
        "leak.xml",
        "<!DOCTYPE r [<!ELEMENT r (#PCDATA)><!ENTITY s SYSTEM \"secret.txt\">]><r>&s;</r>",
    );

    // The default resolver reads local files.
    let doc = validate(&path, None).unwrap();
    assert_eq!(doc.text_content(doc.root_element().unwrap()), "top secret");

    let deny = |request: &ExternalEntityRequest<'_>| -> Result<ExternalEntity, ResolveError> {
        Err(ResolveError::Unsupported(request.system_id.to_owned()))
    };
    let sandboxed = Validator::new(ValidatorOptions::default().entity_resolver(deny));
    let err = sandboxed.validate(&path, None).unwrap_err();
    assert!(err.to_string().contains("secret.txt"), "{err}");
}

#[test]
fn test_external_subset_skipped_when_disabled() {
    let xml = "<!DOCTYPE r SYSTEM \"does-not-exist.dtd\"><r/>";
    let opts = ParseOptions::default().load_external_dtd(false);
    assert!(parse_str_with_options(xml, &opts).is_ok());
    assert!(parse_str_with_options(xml, &ParseOptions::default()).is_err());
}
