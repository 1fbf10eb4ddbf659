//! src/error.rs
//! Crate-level error type and `Result` alias.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognized release profile '{0}'")]
    InvalidProfileSelector(String),

    #[error("failed to create archive {}", .archive.display())]
    ArchiveCreation {
        archive: PathBuf,
        #[source]
        source: ArchiveCreationError,
    },

    #[error("filesystem error at {}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

/// Why the archive primitive refused or failed to produce an archive.
#[derive(Debug, Error)]
pub enum ArchiveCreationError {
    #[error("destination directory {} does not exist", .0.display())]
    MissingDestination(PathBuf),

    #[error("component group '{group}' not found under {}", .root.display())]
    MissingGroup { group: String, root: PathBuf },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn archive(archive: impl Into<PathBuf>, source: impl Into<ArchiveCreationError>) -> Self {
        Error::ArchiveCreation { archive: archive.into(), source: source.into() }
    }

    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem { path: path.into(), source }
    }

    /// Renders the error followed by every underlying cause, one per line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = StdError::source(self);
        while let Some(e) = cause {
            out.push_str(&format!("\n  caused by: {}", e));
            cause = e.source();
        }
        out
    }
}
