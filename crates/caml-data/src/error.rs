//! Error taxonomy for document loading, mutation and saving.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the CAML document model.
///
/// Structural failures abort the current load/save; soft attribute parse
/// failures never appear here, they resolve to "absent" at the codec layer.
#[derive(Debug, Error)]
pub enum CamlError {
    /// The bundle has no `index.xml` manifest. The only unconditionally
    /// fatal condition when opening a bundle directory.
    #[error("bundle manifest not found: {}", .path.display())]
    ManifestNotFound { path: PathBuf },

    /// The markup (or manifest content) could not be parsed.
    #[error("malformed document markup: {detail}")]
    MalformedMarkup { detail: String },

    /// A structurally required layer attribute is absent or unusable.
    #[error("element {element} is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },

    /// A direct sibling with the same id already exists.
    #[error("a sublayer with id `{id}` already exists at this level")]
    DuplicateId { id: String },

    /// Filesystem failure, with the path it happened on.
    #[error("i/o failure at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest property list could not be read or written.
    #[error("property list failure at {}: {}", .path.display(), .source)]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },
}

impl CamlError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        CamlError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn plist(path: impl AsRef<Path>, source: plist::Error) -> Self {
        CamlError::Plist {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn markup(detail: impl Into<String>) -> Self {
        CamlError::MalformedMarkup {
            detail: detail.into(),
        }
    }
}
