//! Exclusion patterns applied to bare entry names.
//!
//! Patterns are shell globs matched case-insensitively against the file or
//! directory name only, never the full path: `node_modules` excludes every
//! directory called `node_modules` at any depth, `*.tmp` excludes every
//! temporary file. A trailing `/` restricts a pattern to directories.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

#[derive(Debug, Clone)]
pub struct PathFilter {
    any: GlobSet,
    dirs_only: GlobSet,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            any: GlobSet::empty(),
            dirs_only: GlobSet::empty(),
        }
    }
}

impl PathFilter {
    /// Compiles `patterns`. An invalid glob is a configuration error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut any = GlobSetBuilder::new();
        let mut dirs_only = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let (target, glob_src) = match pattern.strip_suffix('/') {
                Some(dir) => (&mut dirs_only, dir),
                None => (&mut any, pattern),
            };
            let glob = GlobBuilder::new(glob_src)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))?;
            target.add(glob);
        }
        Ok(Self {
            any: any.build()?,
            dirs_only: dirs_only.build()?,
        })
    }

    /// `true` when the entry called `name` must not be visited.
    pub fn is_excluded(&self, name: &str, is_dir: bool) -> bool {
        self.any.is_match(name) || (is_dir && self.dirs_only.is_match(name))
    }
}
