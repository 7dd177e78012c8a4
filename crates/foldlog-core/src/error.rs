use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Log source is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Failed to read log line {index}")]
    Read {
        index: u64,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;
