//! Sealed/plaintext classification by marker inspection.

use crate::error::{Result, ShieldError};
use crate::marker::SealMarker;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Current state of a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Sealed,
    Plaintext,
    /// The file could not be read. Never treated as sealed.
    Unreadable(String),
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Sealed => f.write_str("sealed"),
            FileState::Plaintext => f.write_str("plaintext"),
            FileState::Unreadable(reason) => write!(f, "unreadable ({reason})"),
        }
    }
}

/// A resolved relative path together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub state: FileState,
}

/// Report whether `path` starts with `marker`.
///
/// Reads at most `marker.len()` bytes. A file shorter than the marker is
/// unsealed.
pub fn is_sealed(path: &Path, marker: &SealMarker) -> Result<bool> {
    let file = File::open(path).map_err(|e| ShieldError::io_at(path, e))?;

    let mut head = Vec::with_capacity(marker.len());
    file.take(marker.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| ShieldError::io_at(path, e))?;

    Ok(marker.is_present(&head))
}

/// Classify `path`, folding read errors into [`FileState::Unreadable`].
pub fn classify(path: &Path, marker: &SealMarker) -> FileState {
    match is_sealed(path, marker) {
        Ok(true) => FileState::Sealed,
        Ok(false) => FileState::Plaintext,
        Err(ShieldError::IoAt { source, .. }) => FileState::Unreadable(source.to_string()),
        Err(e) => FileState::Unreadable(e.to_string()),
    }
}
