use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use tempfile::TempDir;

/// Create a new temporary git repository with user config set.
#[allow(dead_code)]
pub fn create_git_repo() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");

    git(temp.path(), &["init"]);
    git(temp.path(), &["config", "user.email", "test@example.com"]);
    git(temp.path(), &["config", "user.name", "Test User"]);

    temp
}

/// Run git in `dir`, returning the raw output.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> std::process::Output {
    StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git")
}

/// Write a secret file outside the working tree.
#[allow(dead_code)]
pub fn write_secret(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("vault");
    fs::write(&path, "correct horse battery staple\n").expect("failed to write secret");
    path
}

/// Write `.shield` and `.shieldignore` into `root`.
#[allow(dead_code)]
pub fn write_patterns(root: &Path, include: &str, exclude: &str) {
    fs::write(root.join(".shield"), include).expect("failed to write .shield");
    fs::write(root.join(".shieldignore"), exclude).expect("failed to write .shieldignore");
}

/// Write `content` to `root/rel`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("no parent")).expect("failed to create dirs");
    fs::write(path, content).expect("failed to write file");
}

#[allow(dead_code)]
pub fn is_sealed(path: &Path) -> bool {
    fs::read(path)
        .map(|data| data.starts_with(b"SHIELD[1]:"))
        .unwrap_or(false)
}

/// Convenience helper for spawning the shield binary via assert_cmd.
#[allow(dead_code)]
pub fn shield_cmd() -> Command {
    cargo_bin_cmd!("shield")
}

/// shield preconfigured with the in-process cipher and `secret`.
#[allow(dead_code)]
pub fn shield_with_secret(root: &Path, secret: &Path) -> Command {
    let mut cmd = shield_cmd();
    cmd.arg("-C")
        .arg(root)
        .arg("--cipher")
        .arg("aes-gcm")
        .arg("--password-file")
        .arg(secret)
        .env_remove("SHIELD_JOBS")
        .env_remove("SHIELD_ENCRYPTION_VERSION");
    cmd
}

/// Absolute path to the shield test binary.
#[allow(dead_code)]
pub fn shield_bin() -> &'static str {
    env!("CARGO_BIN_EXE_shield")
}
