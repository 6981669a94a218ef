//! Resolution and loading of external entities.
//!
//! A document can pull in text from other files in three ways: the external
//! DTD subset named by its DOCTYPE, external parameter entities referenced
//! from a DTD, and external general entities referenced from content. All of
//! them go through an [`EntityResolver`], which turns a system identifier into
//! decoded text.
//!
//! [`FileResolver`] is the default. It understands plain paths and `file:`
//! URIs; relative identifiers resolve against the directory of the entity
//! that declared them, or against the working directory when that entity
//! has no location (text handed to the parser directly). Network schemes
//! are refused.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use xmlvalidator::resolver::resolve_system_id;
//!
//! let path = resolve_system_id("books.dtd", Some(Path::new("/data/xml")));
//! assert_eq!(path.unwrap(), Path::new("/data/xml/books.dtd"));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::encoding::{decode_to_utf8, EncodingError};

/// What the parser knows about an external entity it needs to read.
#[derive(Debug, Clone, Copy)]
pub struct ExternalEntityRequest<'a> {
    /// The entity name, or `None` for the external DTD subset.
    pub name: Option<&'a str>,
    /// The SYSTEM identifier as written in the declaration.
    pub system_id: &'a str,
    /// The PUBLIC identifier, if one was declared.
    pub public_id: Option<&'a str>,
    /// Directory of the entity containing the declaration.
    pub base: Option<&'a Path>,
}

impl fmt::Display for ExternalEntityRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "entity '{name}' (\"{}\")", self.system_id),
            None => write!(f, "external DTD subset \"{}\"", self.system_id),
        }
    }
}

/// The decoded replacement text of an external entity.
#[derive(Debug, Clone)]
pub struct ExternalEntity {
    /// The entity text, decoded and with any text declaration removed.
    pub text: String,
    /// Directory that relative identifiers inside `text` resolve against.
    pub base: Option<PathBuf>,
}

/// Why an external entity could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The system identifier names something other than a local file.
    #[error("unsupported system identifier '{0}': only local files can be loaded")]
    Unsupported(String),
    /// The file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// The resolved path.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file's bytes could not be decoded.
    #[error("cannot decode '{}': {source}", path.display())]
    Encoding {
        /// The resolved path.
        path: PathBuf,
        /// The decoding failure.
        #[source]
        source: EncodingError,
    },
}

/// Loads external entities on behalf of the parser.
pub trait EntityResolver: Send + Sync {
    /// Returns the replacement text for `request`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` when the entity cannot be located or read.
    fn resolve(&self, request: &ExternalEntityRequest<'_>) -> Result<ExternalEntity, ResolveError>;
}

impl<F> EntityResolver for F
where
    F: Fn(&ExternalEntityRequest<'_>) -> Result<ExternalEntity, ResolveError> + Send + Sync,
{
    fn resolve(&self, request: &ExternalEntityRequest<'_>) -> Result<ExternalEntity, ResolveError> {
        self(request)
    }
}

/// Reads external entities from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver;

impl EntityResolver for FileResolver {
    fn resolve(&self, request: &ExternalEntityRequest<'_>) -> Result<ExternalEntity, ResolveError> {
        let path = resolve_system_id(request.system_id, request.base)?;
        tracing::debug!(path = %path.display(), "loading {request}");
        let bytes = std::fs::read(&path).map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;
        let text = decode_to_utf8(&bytes).map_err(|source| ResolveError::Encoding {
            path: path.clone(),
            source,
        })?;
        Ok(ExternalEntity {
            text: strip_text_decl(&text).to_string(),
            base: Some(base_dir_of(&path)),
        })
    }
}

/// Maps a system identifier to a file path.
///
/// # Errors
///
/// Returns `ResolveError::Unsupported` for URIs with a scheme other than
/// `file:`.
pub fn resolve_system_id(system_id: &str, base: Option<&Path>) -> Result<PathBuf, ResolveError> {
    let raw = if let Some(rest) = strip_scheme(system_id, "file") {
        let rest = rest.strip_prefix("//localhost").unwrap_or(rest);
        let rest = if rest.starts_with("///") {
            &rest[2..]
        } else {
            rest
        };
        percent_decode(rest)
    } else if has_scheme(system_id) {
        return Err(ResolveError::Unsupported(system_id.to_string()));
    } else {
        system_id.to_string()
    };

    let path = PathBuf::from(raw);
    Ok(match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    })
}

/// Returns the directory a file's relative references resolve against.
#[must_use]
pub fn base_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Removes a leading `<?xml ...?>` text declaration (XML 1.0 §4.3.1).
fn strip_text_decl(text: &str) -> &str {
    let is_decl = text.starts_with("<?xml")
        && text[5..].starts_with(|c: char| c == ' ' || c == '\t' || c == '\r' || c == '\n');
    if !is_decl {
        return text;
    }
    match text.find("?>") {
        Some(end) => &text[end + 2..],
        None => text,
    }
}

fn strip_scheme<'a>(id: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = id.split_once(':')?;
    head.eq_ignore_ascii_case(scheme).then_some(rest)
}

/// A scheme is at least two characters so that `C:\dtd\a.dtd` stays a path.
fn has_scheme(id: &str) -> bool {
    match id.split_once(':') {
        Some((head, _)) => {
            head.len() > 1
                && head.starts_with(|c: char| c.is_ascii_alphabetic())
                && head
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_id_joins_base() {
        let path = resolve_system_id("dtd/books.dtd", Some(Path::new("/srv/xml"))).unwrap();
        assert_eq!(path, PathBuf::from("/srv/xml/dtd/books.dtd"));
    }

    #[test]
    fn test_relative_id_without_base_stays_relative() {
        let path = resolve_system_id("books.dtd", None).unwrap();
        assert_eq!(path, PathBuf::from("books.dtd"));
    }

    #[test]
    fn test_absolute_id_ignores_base() {
        let path = resolve_system_id("/etc/books.dtd", Some(Path::new("/srv"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/books.dtd"));
    }

    #[test]
    fn test_file_uri_forms() {
        assert_eq!(
            resolve_system_id("file:///tmp/a%20b.dtd", None).unwrap(),
            PathBuf::from("/tmp/a b.dtd")
        );
        assert_eq!(
            resolve_system_id("file://localhost/tmp/a.dtd", None).unwrap(),
            PathBuf::from("/tmp/a.dtd")
        );
        assert_eq!(
            resolve_system_id("file:a.dtd", Some(Path::new("/x"))).unwrap(),
            PathBuf::from("/x/a.dtd")
        );
    }

    #[test]
    fn test_network_scheme_is_refused() {
        let err = resolve_system_id("http://example.com/a.dtd", None).unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported(_)));
    }

    #[test]
    fn test_strip_text_decl() {
        assert_eq!(
            strip_text_decl("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!ELEMENT a EMPTY>"),
            "\n<!ELEMENT a EMPTY>"
        );
        assert_eq!(strip_text_decl("<?xml-stylesheet href='a'?>"), "<?xml-stylesheet href='a'?>");
        assert_eq!(strip_text_decl("<!ELEMENT a EMPTY>"), "<!ELEMENT a EMPTY>");
    }

    #[test]
    fn test_file_resolver_reads_and_reports_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ent"), "<?xml encoding=\"UTF-8\"?>hello").unwrap();
        let request = ExternalEntityRequest {
            name: Some("a"),
            system_id: "a.ent",
            public_id: None,
            base: Some(dir.path()),
        };
        let entity = FileResolver.resolve(&request).unwrap();
        assert_eq!(entity.text, "hello");
        assert_eq!(entity.base.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_file_resolver_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExternalEntityRequest {
            name: None,
            system_id: "missing.dtd",
            public_id: None,
            base: Some(dir.path()),
        };
        let err = FileResolver.resolve(&request).unwrap_err();
        assert!(err.to_string().contains("missing.dtd"));
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |req: &ExternalEntityRequest<'_>| -> Result<ExternalEntity, ResolveError> {
            Ok(ExternalEntity {
                text: format!("[{}]", req.system_id),
                base: None,
            })
        };
        let request = ExternalEntityRequest {
            name: Some("x"),
            system_id: "x.ent",
            public_id: None,
            base: None,
        };
        assert_eq!(resolver.resolve(&request).unwrap().text, "[x.ent]");
    }
}
