use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a receive session ends early.
///
/// A byte-count mismatch at end of stream is not listed here: it is reported
/// as a session outcome and the session still finishes normally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("path name too long: {len} bytes (max: {max})")]
    PathTooLong { len: u64, max: usize },

    #[error("failed to open file to write {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl SessionError {
    /// Short kind label used in log lines and the transfer log.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "transport",
            SessionError::PathTooLong { .. } => "protocol",
            SessionError::Open { .. } | SessionError::Write { .. } => "io",
        }
    }
}
