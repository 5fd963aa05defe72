use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type OpenResult<T> = std::result::Result<T, OpenError>;

/// Errors raised while turning a raw registry into a dataset.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("malformed registry input at line {line}: {reason}")]
    MalformedInput { line: u64, reason: String },

    #[error("I/O error while {action} `{path}`: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn malformed(line: u64, reason: impl Into<String>) -> Self {
        BuildError::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors related to the binary offset index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("offset index is empty")]
    Empty,

    #[error("offset index length {len} is not a multiple of {width} bytes")]
    TruncatedEntry { len: usize, width: usize },

    #[error("I/O error while {action} `{path}`: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid vendor regex `{pattern}`")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read filter file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by [`crate::OuiDb::open`].
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("dataset file `{name}` not found in {source_desc}")]
    DatasetNotFound { source_desc: String, name: String },

    #[error("offset index `{name}` is corrupt: {source}")]
    IndexCorrupt {
        name: String,
        #[source]
        source: IndexError,
    },

    #[error("failed to parse entries file `{name}`: {source}")]
    MalformedEntries {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error while {action} `{name}`: {source}")]
    Io {
        action: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("building dataset on demand requires {missing}")]
    NoRegistry { missing: &'static str },

    #[error("failed to build dataset on demand: {0}")]
    Build(#[from] BuildError),
}

impl OpenError {
    pub(crate) fn io(action: &'static str, name: impl Into<String>, source: io::Error) -> Self {
        OpenError::Io {
            action,
            name: name.into(),
            source,
        }
    }
}
