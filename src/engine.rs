//! Orchestration of a run: resolve, classify, gate, execute.

use crate::cipher::CipherProvider;
use crate::config::ShieldConfig;
use crate::error::Result;
use crate::executor::{BatchReport, CancellationToken, Executor};
use crate::git::GitRepo;
use crate::marker::SealMarker;
use crate::oracle::{classify, CandidateFile, FileState};
use crate::pattern::PatternSet;
use crate::transform::{is_temp_name, Operation, TransformJob, Transformer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Shield {
    config: ShieldConfig,
    marker: SealMarker,
    cipher: Arc<dyn CipherProvider>,
    cancel: CancellationToken,
}

impl Shield {
    pub fn new(config: ShieldConfig, cipher: Arc<dyn CipherProvider>) -> Result<Self> {
        config.validate()?;
        let marker = config.marker()?;
        Ok(Self {
            config,
            marker,
            cipher,
            cancel: CancellationToken::new(),
        })
    }

    /// Build with the provider selected in the config.
    pub fn from_config(config: ShieldConfig) -> Result<Self> {
        let cipher: Arc<dyn CipherProvider> =
            Arc::from(config.cipher.build(config.cipher_timeout));
        Self::new(config, cipher)
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn marker(&self) -> &SealMarker {
        &self.marker
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn patterns(&self) -> Result<PatternSet> {
        PatternSet::load(&self.config.root)
    }

    /// Every file selected by the pattern files, with its current state.
    pub fn candidates(&self) -> Result<Vec<CandidateFile>> {
        let patterns = self.patterns()?;
        let resolved = patterns.resolve(&self.config.root)?;

        Ok(resolved
            .into_iter()
            .map(|path| {
                let state = classify(&self.config.root.join(&path), &self.marker);
                CandidateFile { path, state }
            })
            .collect())
    }

    /// Jobs for `operation` after state gating.
    ///
    /// Seal takes plaintext files and unseal takes sealed files. Unreadable
    /// files are scheduled for both so the read error is reported by the job
    /// instead of being skipped.
    pub fn plan(&self, operation: Operation) -> Result<Vec<TransformJob>> {
        let jobs: Vec<TransformJob> = self
            .candidates()?
            .into_iter()
            .filter(|candidate| match (&candidate.state, operation) {
                (FileState::Plaintext, Operation::Seal) => true,
                (FileState::Sealed, Operation::Unseal) => true,
                (FileState::Unreadable(_), _) => true,
                _ => {
                    debug!(path = %candidate.path.display(), state = %candidate.state, "already in target state");
                    false
                }
            })
            .map(|candidate| TransformJob::new(candidate.path, operation))
            .collect();

        debug!(op = %operation, jobs = jobs.len(), "planned batch");
        Ok(jobs)
    }

    pub fn seal(&self) -> Result<BatchReport> {
        let jobs = self.plan(Operation::Seal)?;
        self.execute(jobs)
    }

    pub fn unseal(&self) -> Result<BatchReport> {
        let jobs = self.plan(Operation::Unseal)?;
        self.execute(jobs)
    }

    /// Candidate files that are not sealed.
    pub fn check(&self) -> Result<Vec<CandidateFile>> {
        Ok(self
            .candidates()?
            .into_iter()
            .filter(|candidate| candidate.state != FileState::Sealed)
            .collect())
    }

    /// Classify what the index would commit for files under the root.
    ///
    /// Staged paths are matched against the patterns and judged by the leading
    /// bytes of their staged blob, so a working copy sealed after `git add`
    /// does not hide plaintext in the index. Entries that are not regular
    /// files are left out.
    pub fn classify_staged(&self, repo: &GitRepo) -> Result<Vec<CandidateFile>> {
        let patterns = self.patterns()?;
        let prefix = repo.relative_root(&self.config.root)?;

        let mut classified = Vec::new();
        for staged in repo.staged_paths()? {
            let relative = match &prefix {
                None => staged.as_str(),
                Some(prefix) => match staged
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    Some(rest) => rest,
                    None => continue,
                },
            };
            if relative.rsplit('/').next().is_some_and(is_temp_name) {
                continue;
            }
            if !patterns.matches(relative) {
                continue;
            }

            let Some(head) = repo.staged_head(&staged, self.marker.len())? else {
                continue;
            };
            let state = if self.marker.is_present(&head) {
                FileState::Sealed
            } else {
                FileState::Plaintext
            };
            debug!(path = %staged, state = %state, "classified staged blob");
            classified.push(CandidateFile {
                path: PathBuf::from(relative),
                state,
            });
        }
        Ok(classified)
    }

    /// Run prepared jobs. The secret is checked once before anything starts.
    pub fn execute(&self, jobs: Vec<TransformJob>) -> Result<BatchReport> {
        if jobs.is_empty() {
            info!("nothing to do");
            return Ok(BatchReport::default());
        }

        let secret = self.config.secret()?;
        secret.verify()?;

        let transformer = Transformer::new(
            self.config.root.clone(),
            Arc::clone(&self.cipher),
            secret,
            self.marker.clone(),
        );

        let executor = Executor::new(self.config.max_parallel).with_cancellation(self.cancel.clone());
        info!(
            jobs = jobs.len(),
            workers = executor.max_parallel(),
            cipher = self.cipher.name(),
            "running batch"
        );

        Ok(executor.run_all(jobs, |job| transformer.apply(job)))
    }
}
