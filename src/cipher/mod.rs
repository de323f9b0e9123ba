//! # Cipher Providers
//!
//! The transform engine never encrypts anything itself. It hands a secret and
//! two paths to a [`CipherProvider`], which reads `input` and writes the
//! transformed bytes to `output`. A provider must not leave a meaningful
//! `output` behind when it fails.
//!
//! Providers:
//!
//! - [`OpensslCipher`] - runs `openssl enc -aes-256-cbc -nosalt`, the format
//!   historically written by shield
//! - [`AesGcmCipher`] - in-process AES-256-GCM with an HKDF-derived key
//!
//! Unit tests use `fake::FakeCipher`, a deterministic reversible transform with
//! injectable failures. It is not compiled into the library:
//!
//! ```compile_fail
//! use shield::cipher::fake::FakeCipher;
//! ```

mod aes;
#[cfg(test)]
pub(crate) mod fake;
mod openssl;

pub use aes::AesGcmCipher;
pub use openssl::OpensslCipher;

use crate::error::{Result, ShieldError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to the key material used for every file in a run.
///
/// The core only passes it through; providers decide how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    path: PathBuf,
}

impl Secret {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.ssh/vault`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ShieldError::Config("cannot determine home directory".into()))?;
        Ok(home.join(".ssh").join("vault"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw key material. An empty file counts as unreadable.
    pub fn read(&self) -> Result<Vec<u8>> {
        let bytes = fs::read(&self.path).map_err(|e| ShieldError::SecretUnreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(ShieldError::SecretUnreadable {
                path: self.path.clone(),
                reason: "file is empty".into(),
            });
        }
        Ok(bytes)
    }

    pub fn verify(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    /// Short SHA-256 fingerprint, safe to print.
    pub fn fingerprint(&self) -> Result<String> {
        let digest = Sha256::digest(self.read()?);
        Ok(hex::encode(&digest[..8]))
    }
}

/// A synchronous file-to-file cipher.
pub trait CipherProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Encrypt `input` into `output`.
    fn seal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()>;

    /// Decrypt `input` into `output`.
    fn unseal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()>;
}

/// Provider selection for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CipherKind {
    /// `openssl enc -aes-256-cbc`, compatible with existing sealed files
    #[default]
    Openssl,
    /// In-process AES-256-GCM
    AesGcm,
}

impl CipherKind {
    /// Command-line spelling of the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            CipherKind::Openssl => "openssl",
            CipherKind::AesGcm => "aes-gcm",
        }
    }

    pub fn build(self, timeout: Duration) -> Box<dyn CipherProvider> {
        match self {
            CipherKind::Openssl => Box::new(OpensslCipher::new(timeout)),
            CipherKind::AesGcm => Box::new(AesGcmCipher::new()),
        }
    }
}

/// Write provider output, removing any partial file on failure.
pub(crate) fn write_output(output: &Path, data: &[u8]) -> Result<()> {
    fs::write(output, data).map_err(|e| {
        let _ = fs::remove_file(output);
        ShieldError::io_at(output, e)
    })
}
