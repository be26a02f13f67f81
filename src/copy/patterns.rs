//! Item list pattern matching
//!
//! Item list entries use fnmatch-style globs: `*` also matches `/`, so
//! `SYSTEM/*` selects the whole `SYSTEM` subtree.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Errors for item patterns
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid item pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Glob set error: {0}")]
    GlobError(#[from] globset::Error),
}

/// A compiled set of item patterns
#[derive(Debug, Clone)]
pub struct ItemPatterns {
    glob_set: GlobSet,
}

impl ItemPatterns {
    /// Compile patterns once; matching afterwards never re-parses them.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|source| PatternError::Invalid {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
        }

        Ok(Self {
            glob_set: builder.build()?,
        })
    }

    /// Check whether a root-relative path is selected
    pub fn is_match(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.glob_set.is_match(path_str.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.glob_set.is_empty()
    }
}
