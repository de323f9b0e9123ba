use shield::{Result, ShieldError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Copy the running binary to `target` (or the platform default)
pub fn install(target: Option<&Path>) -> Result<()> {
    let target = target.map(Path::to_path_buf).unwrap_or_else(default_target);
    println!("Installing shield to {}...", target.display());

    let current = env::current_exe()
        .map_err(|e| ShieldError::Other(format!("cannot locate current executable: {e}")))?;

    if let Some(dir) = target.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    fs::copy(&current, &target).map_err(|e| {
        ShieldError::Other(format!("cannot write {}: {e}", target.display()))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
    }

    println!("Installation successful!");
    Ok(())
}

fn default_target() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\shield.exe")
    } else {
        PathBuf::from("/usr/local/bin/shield")
    }
}
