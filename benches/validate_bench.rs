#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use xmlvalidator::xpath::compile;
use xmlvalidator::{evaluate, rewrite_doctype, validate, Document};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

const CATALOG_DTD: &str = "<!ELEMENT catalog (book*)>
<!ELEMENT book (title, author+, price)>
<!ATTLIST book id ID #REQUIRED format (paper|ebook) \"paper\">
<!ELEMENT title (#PCDATA)>
<!ELEMENT author (#PCDATA)>
<!ELEMENT price (#PCDATA)>
";

/// Generates a catalog with `books` entries, optionally carrying its DTD
/// in the internal subset.
fn make_catalog(books: usize, internal_dtd: bool) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    if internal_dtd {
        let _ = writeln!(xml, "<!DOCTYPE catalog [\n{CATALOG_DTD}]>");
    }
    xml.push_str("<catalog>\n");
    for i in 0..books {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\"><title>Title {i}</title>\
             <author>Author {i}</author><author>Editor {i}</author>\
             <price>{}.99</price></book>",
            10 + i % 50
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// Writes the benchmark inputs once and keeps the directory alive.
struct Inputs {
    _dir: tempfile::TempDir,
    embedded: PathBuf,
    bare: PathBuf,
    dtd: PathBuf,
}

impl Inputs {
    fn new(books: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let write = |name: &str, content: &str| -> PathBuf {
            let path = dir.path().join(name);
            std::fs::write(&path, content).expect("write input");
            path
        };
        let embedded = write("embedded.xml", &make_catalog(books, true));
        let bare = write("bare.xml", &make_catalog(books, false));
        let dtd = write("catalog.dtd", CATALOG_DTD);
        Self {
            _dir: dir,
            embedded,
            bare,
            dtd,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation benchmarks
// ---------------------------------------------------------------------------

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    for books in [10, 1000] {
        let inputs = Inputs::new(books);
        group.bench_function(format!("embedded_{books}"), |b| {
            b.iter(|| validate(black_box(&inputs.embedded), None).expect("valid"));
        });
        group.bench_function(format!("external_{books}"), |b| {
            b.iter(|| validate(black_box(&inputs.bare), Some(&inputs.dtd)).expect("valid"));
        });
    }
    group.finish();
}

fn bench_rewrite(c: &mut Criterion) {
    let inputs = Inputs::new(1000);
    c.bench_function("rewrite_doctype_1000", |b| {
        b.iter(|| {
            rewrite_doctype(black_box(&inputs.bare), Path::new("catalog.dtd")).expect("rewrite")
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    let xml = make_catalog(1000, true);
    c.bench_function("parse_1000", |b| {
        b.iter(|| Document::parse_str(black_box(&xml)).expect("parse"));
    });
}

// ---------------------------------------------------------------------------
// XPath benchmarks
// ---------------------------------------------------------------------------

fn bench_xpath(c: &mut Criterion) {
    let inputs = Inputs::new(1000);
    let doc = validate(&inputs.embedded, None).expect("valid");

    c.bench_function("xpath_titles", |b| {
        b.iter(|| evaluate(&doc, black_box("//catalog/book/title")).expect("xpath"));
    });

    let compiled =
        compile("//book[@format='paper' and price > 30][author]/title").expect("compile");
    c.bench_function("xpath_predicates_compiled", |b| {
        b.iter(|| compiled.select_nodes(black_box(&doc)).expect("xpath"));
    });

    c.bench_function("xpath_id_lookup", |b| {
        b.iter(|| evaluate(&doc, black_box("id('bk500 bk999')/title")).expect("xpath"));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(validation, bench_validate, bench_rewrite, bench_parse);
criterion_group!(queries, bench_xpath);
criterion_main!(validation, queries);
