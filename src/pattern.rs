//! # Pattern Resolution
//!
//! Turns the include patterns of `.shield` and the exclude patterns of
//! `.shieldignore` into the concrete set of files a run operates on.
//!
//! ## Pattern Syntax
//!
//! Patterns are matched case-sensitively against `/`-separated paths relative
//! to the operating root:
//!
//! - `*` matches any run of characters except `/`
//! - `?` matches one character except `/`
//! - `**` as a whole segment matches zero or more segments
//!   (`**/x`, `a/**/x`, `a/**`, `**`)
//! - everything else matches literally
//!
//! A pattern without `/` is still matched against the whole relative path, so
//! `*.secret` only selects files at the root; use `**/*.secret` for any depth.
//!
//! Bracket classes, brace alternation and backslash escapes are rejected. The
//! pre-commit hook re-implements this matcher in shell, and keeping the grammar
//! small keeps the two in exact agreement.
//!
//! ## Resolution
//!
//! A file is a candidate iff it is a regular file, some include pattern
//! matches it, and no exclude pattern matches it. The `.git` directory is
//! never walked.

use crate::error::{Result, ShieldError};
use crate::transform::is_temp_name;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Include pattern file, relative to the operating root.
pub const INCLUDE_FILE: &str = ".shield";

/// Exclude pattern file, relative to the operating root.
pub const EXCLUDE_FILE: &str = ".shieldignore";

/// Whitespace trimmed from pattern lines. Unicode spaces are kept as literals.
const PATTERN_WHITESPACE: &[char] = &[' ', '\t', '\n', '\r', '\x0B', '\x0C'];

/// Compiled include and exclude patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    include: GlobSet,
    exclude: GlobSet,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl PatternSet {
    /// Compile both pattern lists. Any malformed pattern fails the whole set.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            include_patterns: include.to_vec(),
            exclude_patterns: exclude.to_vec(),
        })
    }

    /// Read `.shield` and `.shieldignore` from `root` and compile them.
    pub fn load(root: &Path) -> Result<Self> {
        let include = read_pattern_file(&root.join(INCLUDE_FILE))?;
        let exclude = read_pattern_file(&root.join(EXCLUDE_FILE))?;
        debug!(
            includes = include.len(),
            excludes = exclude.len(),
            "loaded pattern files"
        );
        Self::new(&include, &exclude)
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn is_included(&self, relative: &str) -> bool {
        self.include.is_match(normalize(relative))
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.exclude.is_match(normalize(relative))
    }

    /// Explicit path-string matching: included and not vetoed.
    pub fn matches(&self, relative: &str) -> bool {
        let path = normalize(relative);
        self.include.is_match(&path) && !self.exclude.is_match(&path)
    }

    /// Expand the patterns against the tree rooted at `root`.
    ///
    /// Returns sorted, deduplicated paths relative to `root`.
    pub fn resolve(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        let metadata = fs::metadata(root).map_err(|e| ShieldError::io_at(root, e))?;
        if !metadata.is_dir() {
            return Err(ShieldError::Config(format!(
                "operating root is not a directory: {}",
                root.display()
            )));
        }

        let mut candidates = BTreeSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == ".git"));

        for entry in walker {
            // A directory that cannot be listed would hide its matches.
            let entry = entry.map_err(|e| walk_error(root, e))?;

            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_str().is_some_and(is_temp_name) {
                debug!(path = %entry.path().display(), "skipping stale temporary file");
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let Some(key) = relative_key(relative) else {
                warn!(path = %relative.display(), "skipping non UTF-8 path");
                continue;
            };

            if !self.include.is_match(&key) {
                continue;
            }
            if self.exclude.is_match(&key) {
                debug!(path = %key, "excluded by .shieldignore");
                continue;
            }

            candidates.insert(relative.to_path_buf());
        }

        debug!(count = candidates.len(), "resolved candidate files");
        Ok(candidates)
    }
}

/// Resolve `include` minus `exclude` under `root`.
pub fn resolve(root: &Path, include: &[String], exclude: &[String]) -> Result<BTreeSet<PathBuf>> {
    PatternSet::new(include, exclude)?.resolve(root)
}

/// Read a newline-delimited pattern file.
///
/// Blank lines and `#` comments are skipped; surrounding ASCII whitespace is
/// trimmed, the same set the generated hooks strip.
pub fn read_pattern_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| ShieldError::PatternFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(|line| line.trim_matches(PATTERN_WHITESPACE))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Check a pattern against the supported grammar.
pub fn validate(pattern: &str) -> Result<()> {
    let invalid = |reason: &str| ShieldError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(invalid("empty pattern"));
    }
    if pattern.starts_with('/') {
        return Err(invalid("patterns must be relative to the operating root"));
    }
    if let Some(c) = pattern.chars().find(|c| matches!(c, '[' | ']' | '{' | '}' | '\\')) {
        return Err(invalid(&format!("unsupported glob syntax {c:?}")));
    }
    if pattern
        .split('/')
        .any(|segment| segment != "**" && segment.contains("**"))
    {
        return Err(invalid("'**' must be a whole path segment"));
    }

    Ok(())
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        validate(pattern)?;
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| ShieldError::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ShieldError::Pattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

fn walk_error(root: &Path, e: walkdir::Error) -> ShieldError {
    let path = e.path().unwrap_or(root).to_path_buf();
    let source = match e.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("filesystem loop detected"),
    };
    ShieldError::io_at(path, source)
}

fn normalize(relative: &str) -> String {
    let path = relative.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}

fn relative_key(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
