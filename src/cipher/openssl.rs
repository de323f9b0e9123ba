//! `openssl enc` subprocess provider.
//!
//! Produces the same payload as earlier shield releases:
//! `openssl enc -aes-256-cbc -nosalt -pass file:<secret>`.

use super::{CipherProvider, Secret};
use crate::error::{Result, ShieldError};
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const STDERR_LIMIT: usize = 4096;

#[derive(Debug, Clone)]
pub struct OpensslCipher {
    program: PathBuf,
    timeout: Duration,
}

impl Default for OpensslCipher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl OpensslCipher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("openssl"),
            timeout,
        }
    }

    /// Use a different `openssl` executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(secret: &Secret, decrypt: bool, input: &Path, output: &Path) -> Vec<OsString> {
        let mut pass = OsString::from("file:");
        pass.push(secret.path());

        let mut args: Vec<OsString> = vec!["enc".into()];
        if decrypt {
            args.push("-d".into());
        }
        args.extend([
            "-aes-256-cbc".into(),
            "-nosalt".into(),
            "-pass".into(),
            pass,
            "-in".into(),
            input.into(),
            "-out".into(),
            output.into(),
        ]);
        args
    }

    fn run(&self, secret: &Secret, decrypt: bool, input: &Path, output: &Path) -> Result<()> {
        secret.verify()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(Self::args(secret, decrypt, input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(program = %self.program.display(), decrypt, input = %input.display(), "spawning cipher");
        let mut child = cmd.spawn().map_err(|e| {
            ShieldError::Cipher(format!("failed to run {}: {e}", self.program.display()))
        })?;

        let stderr = child.stderr.take();
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            buf.truncate(STDERR_LIMIT);
            buf
        });

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    input = %input.display(),
                    "cipher timed out, killing"
                );
                let _ = child.kill();
                let _ = child.wait();
                let _ = stderr_handle.join();
                let _ = fs::remove_file(output);
                return Err(ShieldError::CipherTimeout(self.timeout.as_secs()));
            }
        };

        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            let _ = fs::remove_file(output);
            return Err(ShieldError::Cipher(format!(
                "{} exited with {status}: {}",
                self.program.display(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        Ok(())
    }
}

impl CipherProvider for OpensslCipher {
    fn name(&self) -> &str {
        "openssl"
    }

    fn seal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        self.run(secret, false, input, output)
    }

    fn unseal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        self.run(secret, true, input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_args() {
        let secret = Secret::new("/home/me/.ssh/vault");
        let args = OpensslCipher::args(&secret, false, Path::new("a.secret"), Path::new("a.tmp"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "enc",
                "-aes-256-cbc",
                "-nosalt",
                "-pass",
                "file:/home/me/.ssh/vault",
                "-in",
                "a.secret",
                "-out",
                "a.tmp"
            ]
        );
    }

    #[test]
    fn test_decrypt_args_include_flag() {
        let secret = Secret::new("vault");
        let args = OpensslCipher::args(&secret, true, Path::new("in"), Path::new("out"));
        assert_eq!(args[1], OsString::from("-d"));
    }

    #[test]
    fn test_missing_program_is_cipher_error() {
        let temp = TempDir::new().unwrap();
        let secret_path = temp.path().join("vault");
        fs::write(&secret_path, b"pw").unwrap();
        let input = temp.path().join("in");
        fs::write(&input, b"data").unwrap();

        let cipher = OpensslCipher::default().with_program(temp.path().join("no-such-openssl"));
        let result = cipher.seal(&Secret::new(&secret_path), &input, &temp.path().join("out"));
        assert!(matches!(result, Err(ShieldError::Cipher(_))));
    }

    #[test]
    fn test_unreadable_secret_checked_before_spawn() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::write(&input, b"data").unwrap();

        let result = OpensslCipher::default().seal(
            &Secret::new(temp.path().join("missing-vault")),
            &input,
            &temp.path().join("out"),
        );
        assert!(matches!(result, Err(ShieldError::SecretUnreadable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_cipher_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let secret_path = temp.path().join("vault");
        fs::write(&secret_path, b"pw").unwrap();
        let input = temp.path().join("in");
        fs::write(&input, b"data").unwrap();

        let fake = temp.path().join("slow-openssl");
        fs::write(&fake, "#!/bin/sh\nexec sleep 5\n").unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let cipher = OpensslCipher::new(Duration::from_millis(200)).with_program(&fake);
        let output = temp.path().join("out");
        let result = cipher.seal(&Secret::new(&secret_path), &input, &output);

        assert!(matches!(result, Err(ShieldError::CipherTimeout(_))));
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_cipher_removes_partial_output() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let secret_path = temp.path().join("vault");
        fs::write(&secret_path, b"pw").unwrap();
        let input = temp.path().join("in");
        fs::write(&input, b"data").unwrap();
        let output = temp.path().join("out");

        let fake = temp.path().join("bad-openssl");
        fs::write(
            &fake,
            format!(
                "#!/bin/sh\necho partial > '{}'\necho 'bad decrypt' >&2\nexit 1\n",
                output.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let cipher = OpensslCipher::default().with_program(&fake);
        let err = cipher
            .unseal(&Secret::new(&secret_path), &input, &output)
            .unwrap_err();

        assert!(err.to_string().contains("bad decrypt"));
        assert!(!output.exists());
    }
}
