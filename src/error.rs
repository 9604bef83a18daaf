//! Engine error type.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor file name does not follow `name_version[-rel...][-arch].ext`.
    #[error("malformed descriptor name: '{0}'")]
    MalformedName(String),

    /// A package is absent from the store that was asked about it.
    #[error("'{name}' not found in {location}")]
    UnknownPackage { name: String, location: String },

    /// The worker pool returned fewer records than descriptors were dispatched.
    #[error("missing data: found {found}, handled {handled}")]
    IncompleteExtraction { found: usize, handled: usize },

    #[error("dependency store {} is unavailable", .0.display())]
    StoreUnavailable(PathBuf),

    #[error("descriptor evaluator failed for {}: {reason}", path.display())]
    Evaluator { path: PathBuf, reason: String },

    #[error("invalid table name: '{0}'")]
    InvalidTable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] anyhow::Error),
}

impl Error {
    /// Build an [`Error::UnknownPackage`] for a store located at `path`.
    pub fn unknown_in(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::UnknownPackage {
            name: name.into(),
            location: path.into().display().to_string(),
        }
    }

    /// Returns `true` when the dependency store looks stale and a rebuild may help.
    pub fn suggests_rebuild(&self) -> bool {
        matches!(
            self,
            Error::UnknownPackage { .. } | Error::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_package_message() {
        let err = Error::unknown_in("zlib", "/var/ybs/db/depend.db");
        assert_eq!(err.to_string(), "'zlib' not found in /var/ybs/db/depend.db");
        assert!(err.suggests_rebuild());
    }

    #[test]
    fn test_incomplete_extraction_message() {
        let err = Error::IncompleteExtraction {
            found: 10,
            handled: 9,
        };
        assert_eq!(err.to_string(), "missing data: found 10, handled 9");
        assert!(!err.suggests_rebuild());
    }
}
