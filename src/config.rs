//! Run configuration.
//!
//! Everything a run depends on (operating root, secret, marker version,
//! parallelism, cipher) lives in one [`ShieldConfig`] value handed to the
//! engine at construction.

use crate::cipher::{CipherKind, Secret};
use crate::error::{Result, ShieldError};
use crate::marker::{SealMarker, DEFAULT_ENCRYPTION_VERSION};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CIPHER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ShieldConfig {
    pub root: PathBuf,
    /// Explicit secret. `None` falls back to `~/.ssh/vault` when first needed.
    pub secret: Option<Secret>,
    pub encryption_version: String,
    pub max_parallel: usize,
    pub cipher: CipherKind,
    pub cipher_timeout: Duration,
}

impl ShieldConfig {
    /// Defaults for `root`: `~/.ssh/vault`, version `1`, one worker per CPU.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: absolute_root(root.as_ref())?,
            secret: None,
            encryption_version: DEFAULT_ENCRYPTION_VERSION.to_string(),
            max_parallel: default_parallelism(),
            cipher: CipherKind::default(),
            cipher_timeout: DEFAULT_CIPHER_TIMEOUT,
        })
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn with_encryption_version(mut self, version: impl Into<String>) -> Self {
        self.encryption_version = version.into();
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_cipher(mut self, cipher: CipherKind) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_cipher_timeout(mut self, timeout: Duration) -> Self {
        self.cipher_timeout = timeout;
        self
    }

    /// The secret for this run, resolving the default location if none was set.
    pub fn secret(&self) -> Result<Secret> {
        match &self.secret {
            Some(secret) => Ok(secret.clone()),
            None => Ok(Secret::new(Secret::default_path()?)),
        }
    }

    /// The marker for this run. Fails on an invalid encryption version.
    pub fn marker(&self) -> Result<SealMarker> {
        SealMarker::new(&self.encryption_version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 {
            return Err(ShieldError::Config("parallelism must be at least 1".into()));
        }
        if self.cipher_timeout.is_zero() {
            return Err(ShieldError::Config("cipher timeout must be positive".into()));
        }
        self.marker().map(|_| ())
    }
}

pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn absolute_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize().map_err(|e| {
        ShieldError::Config(format!(
            "cannot resolve operating root {}: {e}",
            root.display()
        ))
    })
}
