use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShieldError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Cannot read pattern file {}: {source}", path.display())]
    PatternFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not sealed (marker missing): {}", .0.display())]
    MarkerMissing(PathBuf),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Cipher timed out after {0} seconds")]
    CipherTimeout(u64),

    #[error("Rollback failed after cipher error ({cause}): {rollback}")]
    RollbackFailed { cause: String, rollback: String },

    #[error("Secret unreadable at {}: {reason}", path.display())]
    SecretUnreadable { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("Job cancelled before it started")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ShieldError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ShieldError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Errors that make every remaining job in a batch pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShieldError::SecretUnreadable { .. }
                | ShieldError::Config(_)
                | ShieldError::Pattern { .. }
                | ShieldError::PatternFile { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ShieldError>;
