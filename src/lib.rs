//! # shield
//!
//! Selective, marker-tagged encryption of files in a git working tree.
//!
//! Files matching the globs in `.shield` (minus those matching
//! `.shieldignore`) are encrypted in place and prefixed with a seal marker,
//! so their state can be told apart without decrypting them. A generated
//! pre-commit hook refuses commits that would add an unsealed match.
//!
//! ## Quick Start
//!
//! ```bash
//! # Choose what to protect
//! printf '**/*.secret\n**/secrets/*.txt\n' > .shield
//! printf 'test/*\n**/vendors/**\n' > .shieldignore
//!
//! # Put the shared passphrase in ~/.ssh/vault (or pass --password-file)
//! shield seal
//! shield generate-hooks
//!
//! # Later, to work on the files
//! shield unseal
//! ```
//!
//! ## Sealed File Format
//!
//! ```text
//! SHIELD[<encryption version>]:<cipher output>
//! ```
//!
//! The marker is the only metadata. With the default `openssl` cipher the
//! payload is `openssl enc -aes-256-cbc -nosalt` output, readable by earlier
//! shield releases; `--cipher aes-gcm` uses in-process AES-256-GCM instead.
//!
//! ## How a Run Works
//!
//! 1. [`pattern`] resolves the candidate files
//! 2. [`oracle`] classifies each as sealed or plaintext
//! 3. files already in the target state are dropped
//! 4. [`executor`] runs [`transform`] over the rest on a bounded worker pool
//! 5. [`marker`] adds or removes the tag with atomic replace-by-rename
//!
//! Per-file failures are collected in a [`BatchReport`]; pattern and
//! configuration errors abort the run before any file is touched.
//!
//! ## Module Overview
//!
//! - [`pattern`] - include/exclude glob resolution
//! - [`marker`] - the seal marker and atomic add/remove
//! - [`oracle`] - sealed/plaintext classification
//! - [`transform`] - per-file seal and unseal protocols
//! - [`executor`] - bounded parallel execution with cancellation
//! - [`cipher`] - cipher providers and the secret handle
//! - [`hook`] - pre-commit hook generation
//! - [`engine`] - ties a run together
//! - [`git`] - repository discovery and staged paths
//! - [`config`] - run configuration
//! - [`error`] - error type

pub mod cipher;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod git;
pub mod hook;
pub mod logging;
pub mod marker;
pub mod oracle;
pub mod pattern;
pub mod transform;

pub use cipher::{CipherKind, CipherProvider, Secret};
pub use config::ShieldConfig;
pub use engine::Shield;
pub use error::{Result, ShieldError};
pub use executor::{BatchReport, CancellationToken, Executor};
pub use marker::SealMarker;
pub use pattern::PatternSet;
pub use transform::{Operation, TransformJob};
