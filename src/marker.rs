//! # Seal Marker
//!
//! Every sealed file starts with a fixed ASCII tag:
//!
//! ```text
//! SHIELD[<encryption version>]:<cipher output bytes>
//! ```
//!
//! The tag is the only structural metadata of a sealed file. There is no length
//! field and no checksum; a file is sealed exactly when its first
//! [`SealMarker::len`] bytes equal the tag.
//!
//! Adding and removing the tag are whole-file read-modify-write operations.
//! The new content is written to a temporary sibling, synced, and renamed over
//! the original, so readers see either the old or the new content and never a
//! truncated file.

use crate::error::{Result, ShieldError};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

pub const MARKER_PREFIX: &str = "SHIELD";

/// Encryption version used when none is configured.
pub const DEFAULT_ENCRYPTION_VERSION: &str = "1";

/// The byte prefix that identifies sealed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealMarker {
    tag: String,
}

impl SealMarker {
    /// Build the marker for an encryption version.
    ///
    /// The version ends up verbatim inside generated hook scripts, so only
    /// ASCII alphanumerics and `.`, `_`, `-` are accepted.
    pub fn new(encryption_version: &str) -> Result<Self> {
        if encryption_version.is_empty() {
            return Err(ShieldError::Config(
                "encryption version must not be empty".into(),
            ));
        }
        if let Some(c) = encryption_version
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(ShieldError::Config(format!(
                "encryption version contains unsupported character {c:?}"
            )));
        }

        Ok(Self {
            tag: format!("{MARKER_PREFIX}[{encryption_version}]:"),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.tag.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Length of the marker in bytes (`markerLen`).
    pub fn len(&self) -> usize {
        self.tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_empty()
    }

    /// Check whether `data` starts with this marker.
    pub fn is_present(&self, data: &[u8]) -> bool {
        data.len() >= self.len() && &data[..self.len()] == self.as_bytes()
    }

    /// Prepend the marker to the file at `path`.
    ///
    /// Callers must only use this on content that does not carry the marker yet.
    pub fn add(&self, path: &Path) -> Result<()> {
        let content = fs::read(path).map_err(|e| ShieldError::io_at(path, e))?;

        let mut tagged = Vec::with_capacity(self.len() + content.len());
        tagged.extend_from_slice(self.as_bytes());
        tagged.extend_from_slice(&content);

        atomic_write(path, &tagged)?;
        debug!(path = %path.display(), "added seal marker");
        Ok(())
    }

    /// Strip the marker from the file at `path`.
    ///
    /// Fails with [`ShieldError::MarkerMissing`] and leaves the file untouched
    /// when the content does not start with the marker.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let content = fs::read(path).map_err(|e| ShieldError::io_at(path, e))?;

        if !self.is_present(&content) {
            return Err(ShieldError::MarkerMissing(path.to_path_buf()));
        }

        atomic_write(path, &content[self.len()..])?;
        debug!(path = %path.display(), "removed seal marker");
        Ok(())
    }
}

impl std::fmt::Display for SealMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Replace the content of `path` via a synced temporary sibling and a rename.
///
/// The replacement keeps the permissions of the existing file.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ShieldError::io_at(dir, e))?;
    tmp.write_all(content)
        .map_err(|e| ShieldError::io_at(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ShieldError::io_at(tmp.path(), e))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())
            .map_err(|e| ShieldError::io_at(tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| ShieldError::io_at(path, e.error))?;
    Ok(())
}
