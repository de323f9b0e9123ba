use crate::error::{Result, ShieldError};
use git2::{Delta, Index, Repository};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|_| ShieldError::NotInGitRepo)?;
        Ok(Self { repo })
    }

    /// Get the git directory path
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get repository root path
    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir().ok_or(ShieldError::Other(
            "Repository has no working directory".into(),
        ))
    }

    /// Directory git runs hooks from, honoring `core.hooksPath`.
    pub fn hooks_dir(&self) -> Result<PathBuf> {
        let config = self.repo.config()?;
        match config.get_path("core.hooksPath") {
            Ok(path) if path.is_absolute() => Ok(path),
            Ok(path) => Ok(self.workdir()?.join(path)),
            Err(_) => Ok(self.git_dir().join("hooks")),
        }
    }

    /// Paths added, copied, modified or renamed in the index relative to
    /// `HEAD`, relative to the working directory root.
    pub fn staged_paths(&self) -> Result<Vec<String>> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(_) => None,
        };

        let index = self.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;

        let mut paths = Vec::new();
        for delta in diff.deltas() {
            if delta.status() == Delta::Deleted {
                continue;
            }
            if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                paths.push(path.replace('\\', "/"));
            }
        }

        debug!(count = paths.len(), "collected staged paths");
        Ok(paths)
    }

    /// The index as currently on disk.
    fn index(&self) -> Result<Index> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }

    /// Up to `len` leading bytes of the blob staged at `path`.
    ///
    /// `None` when the index has no regular file at `path` (absent, symlink
    /// or submodule).
    pub fn staged_head(&self, path: &str, len: usize) -> Result<Option<Vec<u8>>> {
        let index = self.index()?;
        let Some(entry) = index.get_path(Path::new(path), 0) else {
            return Ok(None);
        };
        if entry.mode & 0o170000 != 0o100000 {
            return Ok(None);
        }

        let blob = self.repo.find_blob(entry.id)?;
        let content = blob.content();
        Ok(Some(content[..content.len().min(len)].to_vec()))
    }

    /// `root` relative to the working directory as a `/`-joined string,
    /// `None` when `root` is the top level.
    pub fn relative_root(&self, root: &Path) -> Result<Option<String>> {
        let workdir = self.workdir()?.canonicalize()?;
        let root = root.canonicalize()?;
        let relative = root.strip_prefix(&workdir).map_err(|_| {
            ShieldError::Config(format!(
                "{} is not inside the repository at {}",
                root.display(),
                workdir.display()
            ))
        })?;

        if relative.as_os_str().is_empty() {
            return Ok(None);
        }
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        Ok(Some(parts.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        (temp, repo)
    }

    #[test]
    fn test_open_outside_repo_fails() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            GitRepo::open(temp.path()),
            Err(ShieldError::NotInGitRepo)
        ));
    }

    #[test]
    fn test_default_hooks_dir() {
        let (temp, _repo) = init_repo();
        let git = GitRepo::open(temp.path()).unwrap();
        assert!(git.hooks_dir().unwrap().ends_with(".git/hooks"));
    }

    #[test]
    fn test_hooks_path_override() {
        let (temp, repo) = init_repo();
        repo.config()
            .unwrap()
            .set_str("core.hooksPath", ".githooks")
            .unwrap();

        let git = GitRepo::open(temp.path()).unwrap();
        let hooks = git.hooks_dir().unwrap();
        assert!(hooks.ends_with(".githooks"));
    }

    #[test]
    fn test_staged_paths_on_unborn_branch() {
        let (temp, repo) = init_repo();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("a/x.secret"), b"secret").unwrap();
        fs::write(temp.path().join("untracked.secret"), b"secret").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a/x.secret")).unwrap();
        index.write().unwrap();

        let git = GitRepo::open(temp.path()).unwrap();
        assert_eq!(git.staged_paths().unwrap(), vec!["a/x.secret".to_string()]);
    }

    #[test]
    fn test_staged_head_reads_index_not_worktree() {
        let (temp, repo) = init_repo();
        fs::write(temp.path().join("a.secret"), b"staged plaintext").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.secret")).unwrap();
        index.write().unwrap();
        fs::write(temp.path().join("a.secret"), b"SHIELD[1]:worktree").unwrap();

        let git = GitRepo::open(temp.path()).unwrap();
        assert_eq!(
            git.staged_head("a.secret", 6).unwrap(),
            Some(b"staged".to_vec())
        );
        assert_eq!(
            git.staged_head("a.secret", 100).unwrap(),
            Some(b"staged plaintext".to_vec())
        );
        assert_eq!(git.staged_head("missing.secret", 6).unwrap(), None);
    }

    #[test]
    fn test_relative_root() {
        let (temp, _repo) = init_repo();
        fs::create_dir_all(temp.path().join("config/prod")).unwrap();
        let git = GitRepo::open(temp.path()).unwrap();

        assert_eq!(git.relative_root(temp.path()).unwrap(), None);
        assert_eq!(
            git.relative_root(&temp.path().join("config/prod")).unwrap(),
            Some("config/prod".to_string())
        );

        let other = TempDir::new().unwrap();
        assert!(git.relative_root(other.path()).is_err());
    }
}
