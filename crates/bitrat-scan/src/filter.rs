//! Entry filtering shared by both walkers.

use std::path::Path;

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};

use bitrat_core::{ConfigError, TraversalPolicy};

/// A [`TraversalPolicy`] with its patterns compiled.
///
/// Both walkers apply the same precedence: directories are decided by
/// recurse, version control, hidden and exclude rules; files by hidden,
/// exclude and then the name glob. Directories are never glob-filtered.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    pattern: Option<GlobMatcher>,
    exclude: GlobSet,
    recurse: bool,
    hidden_dirs: bool,
    hidden_files: bool,
    include_vcs: bool,
}

impl EntryFilter {
    /// Compile a policy. An invalid pattern is a fatal configuration error.
    pub fn new(policy: &TraversalPolicy) -> Result<Self, ConfigError> {
        let pattern = if policy.pattern.is_empty() {
            None
        } else {
            Some(compile(&policy.pattern)?.compile_matcher())
        };

        let mut builder = GlobSetBuilder::new();
        for pattern in &policy.exclude {
            builder.add(compile(pattern)?);
        }
        let exclude = builder.build().map_err(|e| ConfigError::InvalidPattern {
            pattern: policy.exclude.join(","),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern,
            exclude,
            recurse: policy.recurse,
            hidden_dirs: policy.hidden_dirs,
            hidden_files: policy.hidden_files,
            include_vcs: policy.include_vcs,
        })
    }

    /// Decide whether to descend into a directory below the root.
    pub fn descend(&self, name: &str) -> bool {
        if !self.recurse {
            return false;
        }
        if TraversalPolicy::is_vcs_dir(name) && !self.include_vcs {
            return false;
        }
        if TraversalPolicy::is_hidden(name) && !self.hidden_dirs {
            return false;
        }
        !self.exclude.is_match(Path::new(name))
    }

    /// Decide whether to emit a regular file.
    pub fn accept_file(&self, name: &str) -> bool {
        if TraversalPolicy::is_hidden(name) && !self.hidden_files {
            return false;
        }
        if self.exclude.is_match(Path::new(name)) {
            return false;
        }
        self.pattern
            .as_ref()
            .is_none_or(|glob| glob.is_match(Path::new(name)))
    }
}

fn compile(pattern: &str) -> Result<Glob, ConfigError> {
    Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.kind().to_string(),
    })
}
