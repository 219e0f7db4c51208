use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("index folder {0} already contains data")]
    IndexExists(PathBuf),

    #[error("missing path {0}")]
    MissingPath(PathBuf),

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid format for {element}: {message}")]
    InvalidFormat { element: String, message: String },

    #[error("offset {offset} is out of range (length {len})")]
    OutOfRange { offset: u64, len: u64 },

    #[error("record at {offset} (length {len}) spans two pages")]
    SplitRecord { offset: u64, len: usize },

    #[error("buffer is mapped read-only")]
    ReadOnly,

    #[error("PageRank did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error::InvalidFormat {
            element: element.into(),
            message: message.into(),
        }
    }
}

/// Attaches a context to I/O results
pub trait IoContext<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| Error::io(context(), e))
    }
}
