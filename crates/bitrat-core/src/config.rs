//! Run configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Directory names treated as version control metadata.
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn", ".bzr"];

/// Which files a walker emits and which directories it descends into.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct TraversalPolicy {
    /// Glob matched against a file's base name (empty = match all).
    #[builder(default)]
    #[serde(default)]
    pub pattern: String,

    /// Globs matched against any entry's base name; matches are skipped.
    #[builder(default)]
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Descend below the root directory.
    #[builder(default = "false")]
    #[serde(default)]
    pub recurse: bool,

    /// Descend into hidden (dot-prefixed) directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub hidden_dirs: bool,

    /// Emit hidden (dot-prefixed) files.
    #[builder(default = "false")]
    #[serde(default)]
    pub hidden_files: bool,

    /// Descend into version control directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_vcs: bool,

    /// Maximum directories listed at once by the bounded walker.
    #[builder(default = "default_concurrency()")]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    default_workers()
}

/// Default hashing worker count: one more than the available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        + 1
}

impl TraversalPolicyBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.concurrency == Some(0) {
            return Err("Traversal concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

impl TraversalPolicy {
    /// Create a new policy builder.
    pub fn builder() -> TraversalPolicyBuilder {
        TraversalPolicyBuilder::default()
    }

    /// Check whether a file name is hidden.
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Check whether a directory name belongs to version control.
    pub fn is_vcs_dir(name: &str) -> bool {
        VCS_DIRS.contains(&name)
    }
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            exclude: Vec::new(),
            recurse: false,
            hidden_dirs: false,
            hidden_files: false,
            include_vcs: false,
            concurrency: default_concurrency(),
        }
    }
}

/// Traversal strategy selected per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum WalkStrategy {
    /// Single-threaded depth-first walk.
    #[default]
    Sequential,
    /// One task per directory, gated by a directory-handle semaphore.
    Bounded,
}

/// Ordering discipline applied between hashing and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OrderingMode {
    /// Forward records in arrival order.
    #[default]
    Fifo,
    /// Buffer everything, then emit sorted by path.
    ByPath,
}

/// Shape of the pipeline: worker count, queue capacities, disciplines.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct PipelineConfig {
    /// Number of hashing workers.
    #[builder(default = "default_workers()")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the traversal → hashing queue.
    #[builder(default = "128")]
    #[serde(default = "default_readahead")]
    pub readahead: usize,

    /// Capacity of the hashing → ordering queue.
    #[builder(default = "128")]
    #[serde(default = "default_writeahead")]
    pub writeahead: usize,

    /// Capacity of the ordering → output queue.
    #[builder(default = "1024")]
    #[serde(default = "default_order_capacity")]
    pub order_capacity: usize,

    /// Ordering discipline.
    #[builder(default)]
    #[serde(default)]
    pub ordering: OrderingMode,

    /// Traversal strategy.
    #[builder(default)]
    #[serde(default)]
    pub strategy: WalkStrategy,

    /// Collect and report run statistics.
    #[builder(default = "false")]
    #[serde(default)]
    pub stats: bool,
}

fn default_readahead() -> usize {
    128
}

fn default_writeahead() -> usize {
    128
}

fn default_order_capacity() -> usize {
    1024
}

impl PipelineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Worker count must be at least 1".to_string());
        }
        for (name, capacity) in [
            ("readahead", self.readahead),
            ("writeahead", self.writeahead),
            ("order capacity", self.order_capacity),
        ] {
            if capacity == Some(0) {
                return Err(format!("The {name} queue capacity must be at least 1"));
            }
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Create a new config builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            readahead: default_readahead(),
            writeahead: default_writeahead(),
            order_capacity: default_order_capacity(),
            ordering: OrderingMode::default(),
            strategy: WalkStrategy::default(),
            stats: false,
        }
    }
}
