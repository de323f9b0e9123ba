//! # Per-file Seal and Unseal
//!
//! ## Seal
//!
//! ```text
//! cipher(path -> .name.shield-seal) -> add marker to temp -> rename temp over path
//! ```
//!
//! A cipher or marker failure deletes the temporary file; the original is
//! never touched until the final rename.
//!
//! ## Unseal
//!
//! ```text
//! remove marker from path -> cipher(path -> .name.shield-unseal) -> rename temp over path
//! ```
//!
//! The marker comes off first. If the reverse cipher fails the marker is put
//! back, so the file ends up exactly as it was before the job.

use crate::cipher::{CipherProvider, Secret};
use crate::error::{Result, ShieldError};
use crate::marker::SealMarker;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Seal,
    Unseal,
}

impl Operation {
    /// Suffix of the temporary sibling written while this operation runs.
    pub fn temp_suffix(self) -> &'static str {
        match self {
            Operation::Seal => ".shield-seal",
            Operation::Unseal => ".shield-unseal",
        }
    }
}

/// Whether `name` is a temporary sibling left behind by a seal or unseal.
pub fn is_temp_name(name: &str) -> bool {
    [Operation::Seal, Operation::Unseal]
        .iter()
        .any(|op| name.ends_with(op.temp_suffix()))
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Seal => f.write_str("seal"),
            Operation::Unseal => f.write_str("unseal"),
        }
    }
}

/// One file to transform. `path` is relative to the operating root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformJob {
    pub path: PathBuf,
    pub operation: Operation,
}

impl TransformJob {
    pub fn new(path: impl Into<PathBuf>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
        }
    }
}

/// Applies the seal/unseal protocols to files under a root.
pub struct Transformer {
    root: PathBuf,
    cipher: Arc<dyn CipherProvider>,
    secret: Secret,
    marker: SealMarker,
}

impl Transformer {
    pub fn new(
        root: impl Into<PathBuf>,
        cipher: Arc<dyn CipherProvider>,
        secret: Secret,
        marker: SealMarker,
    ) -> Self {
        Self {
            root: root.into(),
            cipher,
            secret,
            marker,
        }
    }

    pub fn apply(&self, job: &TransformJob) -> Result<()> {
        let path = self.root.join(&job.path);
        match job.operation {
            Operation::Seal => self.seal_file(&path),
            Operation::Unseal => self.unseal_file(&path),
        }
    }

    /// Encrypt `path` and tag it. The caller must only pass unsealed files.
    pub fn seal_file(&self, path: &Path) -> Result<()> {
        let tmp = temp_sibling(path, Operation::Seal)?;

        if let Err(e) = self.cipher.seal(&self.secret, path, &tmp) {
            discard(&tmp);
            return Err(e);
        }
        debug!(path = %path.display(), cipher = self.cipher.name(), "cipher output written");

        if let Err(e) = self.marker.add(&tmp) {
            discard(&tmp);
            return Err(e);
        }

        if let Err(e) = replace(&tmp, path) {
            discard(&tmp);
            return Err(e);
        }

        Ok(())
    }

    /// Untag `path` and decrypt it, restoring the tag if decryption fails.
    pub fn unseal_file(&self, path: &Path) -> Result<()> {
        self.marker.remove(path)?;

        let tmp = temp_sibling(path, Operation::Unseal)?;

        if let Err(cause) = self.cipher.unseal(&self.secret, path, &tmp) {
            discard(&tmp);
            return Err(self.rollback(path, cause));
        }
        debug!(path = %path.display(), cipher = self.cipher.name(), "cipher output written");

        if let Err(cause) = replace(&tmp, path) {
            discard(&tmp);
            return Err(self.rollback(path, cause));
        }

        Ok(())
    }

    fn rollback(&self, path: &Path, cause: ShieldError) -> ShieldError {
        warn!(path = %path.display(), err = %cause, "unseal failed, restoring marker");
        match self.marker.add(path) {
            Ok(()) => cause,
            Err(rollback) => ShieldError::RollbackFailed {
                cause: cause.to_string(),
                rollback: rollback.to_string(),
            },
        }
    }
}

/// `dir/.name.shield-<op>`, next to `path` so the final rename stays on
/// one filesystem.
fn temp_sibling(path: &Path, op: Operation) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        ShieldError::Other(format!("path has no file name: {}", path.display()))
    })?;

    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(op.temp_suffix());
    Ok(path.with_file_name(tmp_name))
}

/// Move `tmp` over `path`, keeping the permissions of `path`.
fn replace(tmp: &Path, path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| ShieldError::io_at(path, e))?;
    fs::set_permissions(tmp, metadata.permissions()).map_err(|e| ShieldError::io_at(tmp, e))?;
    fs::rename(tmp, path).map_err(|e| ShieldError::io_at(path, e))
}

fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %tmp.display(), err = %e, "failed to remove temporary file");
        }
    }
}
