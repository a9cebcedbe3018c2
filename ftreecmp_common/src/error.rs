use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FTreeCmpError {
    #[error("unable to open directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to stat {}: {source}", path.display())]
    StatUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("readlink({}) failed: {source}", path.display())]
    LinkUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read from {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FTreeCmpError {
    /// The filesystem object this error concerns, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::DirectoryUnreadable { path, .. }
            | Self::StatUnavailable { path, .. }
            | Self::LinkUnreadable { path, .. }
            | Self::OpenFailed { path, .. }
            | Self::ReadFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FTreeCmpError>;
