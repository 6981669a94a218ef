//! Command-line XML validator.
//!
//! Validates an XML file against the DTD it declares, or against a DTD
//! given on the command line, and optionally prints the text of the nodes
//! an `XPath` expression selects.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmlvalidator::{evaluate, Validator, ValidatorOptions};

const USAGE: &str = "Usage: xmlvalidator <XML file path> [DTD file path|null] [XPath expression]";

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Validate an XML file against its DTD (or the one given) and optionally
/// evaluate an XPath expression over it.
///
/// Set `RUST_LOG=debug` for parser and resolver diagnostics.
#[derive(Parser, Debug)]
#[command(name = "xmlvalidator", version, about, long_about = None)]
struct Cli {
    /// The XML document to validate.
    #[arg(value_name = "XML file path", allow_hyphen_values = true)]
    xml: Option<PathBuf>,

    /// A DTD to validate against instead of the document's own. The word
    /// `null` (any case) means the document's own DTD.
    #[arg(value_name = "DTD file path|null", allow_hyphen_values = true)]
    dtd: Option<String>,

    /// An XPath 1.0 expression; the text of each selected node is printed.
    #[allow(clippy::doc_markdown)]
    #[arg(value_name = "XPath expression", allow_hyphen_values = true)]
    xpath: Option<String>,

    /// Anything after the expression is ignored.
    #[arg(hide = true, num_args = 0.., allow_hyphen_values = true)]
    _rest: Vec<String>,
}

impl Cli {
    fn dtd_path(&self) -> Option<&Path> {
        self.dtd
            .as_deref()
            .filter(|dtd| !dtd.eq_ignore_ascii_case("null"))
            .map(Path::new)
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(xml) = cli.xml.as_deref() else {
        eprintln!("{USAGE}");
        return ExitCode::from(EXIT_USAGE);
    };

    match run(xml, cli.dtd_path(), cli.xpath.as_deref()) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log_error_chain(&err);
            eprintln!("Error: {err}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Validates and queries, returning everything to print on success.
fn run(xml: &Path, dtd: Option<&Path>, xpath: Option<&str>) -> Result<Vec<String>, xmlvalidator::Error> {
    let validator = Validator::new(ValidatorOptions::default());
    let doc = validator.validate(xml, dtd)?;
    tracing::debug!(path = %xml.display(), dtd = %doc.dtd_source(), "document is valid");

    let mut lines = vec!["XML validation successful.".to_owned()];
    if let Some(expression) = xpath {
        let result = evaluate(&doc, expression)?;
        lines.push("XPath Result:".to_owned());
        lines.extend(result.iter().map(|node| node.text_content()));
    }
    Ok(lines)
}

fn log_error_chain(err: &xmlvalidator::Error) {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    tracing::debug!(
        error = %err,
        location = ?err.location(),
        causes = ?chain,
        "validation failed"
    );
}
