pub mod check;
pub mod hooks;
pub mod install;
pub mod seal;
pub mod version;

pub use check::{check, scan};
pub use hooks::generate_hooks;
pub use install::install;
pub use seal::{seal, unseal};
pub use version::version;

use clap::Args;
use shield::cipher::{CipherKind, Secret};
use shield::config::{ShieldConfig, DEFAULT_CIPHER_TIMEOUT};
use shield::marker::DEFAULT_ENCRYPTION_VERSION;
use shield::{BatchReport, Result, ShieldError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory to operate on
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Secret file (default: ~/.ssh/vault)
    #[arg(long, global = true, env = "SHIELD_PASSWORD_FILE")]
    pub password_file: Option<PathBuf>,

    /// Maximum number of files processed in parallel (default: CPU count)
    #[arg(short, long, global = true, env = "SHIELD_JOBS")]
    pub jobs: Option<usize>,

    /// Cipher provider
    #[arg(long, global = true, value_enum, env = "SHIELD_CIPHER", default_value = "openssl")]
    pub cipher: CipherKind,

    /// Seconds before an external cipher invocation is killed
    #[arg(long, global = true, default_value_t = DEFAULT_CIPHER_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Encryption version embedded in the seal marker
    #[arg(
        long,
        global = true,
        env = "SHIELD_ENCRYPTION_VERSION",
        default_value = DEFAULT_ENCRYPTION_VERSION
    )]
    pub encryption_version: String,
}

impl GlobalArgs {
    pub fn config(&self) -> Result<ShieldConfig> {
        let mut config = ShieldConfig::new(&self.dir)?
            .with_encryption_version(&self.encryption_version)
            .with_cipher(self.cipher)
            .with_cipher_timeout(Duration::from_secs(self.timeout));

        if let Some(path) = &self.password_file {
            config = config.with_secret(Secret::new(path));
        }
        if let Some(jobs) = self.jobs {
            config = config.with_max_parallel(jobs);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Whether a `shield` executable can be found on `PATH`.
pub(crate) fn shield_on_path() -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    let name = if cfg!(windows) { "shield.exe" } else { "shield" };
    env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

pub(crate) fn warn_if_not_installed() {
    if !shield_on_path() {
        eprintln!(
            "Warning: shield is not on PATH, so the pre-commit hook cannot call it. \
             Run 'shield install' or add it to PATH."
        );
    }
}

pub(crate) fn print_report(verb: &str, report: &BatchReport) {
    for path in &report.succeeded {
        println!("{verb}: {}", path.display());
    }
    for (path, err) in &report.failed {
        println!("Failed: {} ({})", path.display(), err);
    }
    for path in &report.cancelled {
        println!("Skipped: {} (batch cancelled)", path.display());
    }
}

/// Turn a report with failures into an error so the process exits non-zero.
pub(crate) fn finish(report: &BatchReport, op: &str) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    Err(ShieldError::Other(format!(
        "{} of {} files could not {op}",
        report.failed.len() + report.cancelled.len(),
        report.total()
    )))
}
