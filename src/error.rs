use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A tree or node document does not have the expected shape.
    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("{}:{line}: {message}", path.display())]
    Table {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A write was requested without a destination and none was remembered.
    #[error("no directory to write to")]
    NoPath,

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Some files of a directory write failed; the others were written.
    #[error("failed to write {} file(s)", .0.len())]
    PartialWrite(Vec<(PathBuf, String)>),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
