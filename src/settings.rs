//! Settings file and option resolution.
//!
//! Every option resolves as command-line flag, then `BITRAT_*` environment
//! variable (both handled by clap), then the TOML settings file, then the
//! built-in default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use color_eyre::eyre::{Context, Result, eyre};
use serde::Deserialize;
use tracing::debug;

use bitrat_attr::DEFAULT_PREFIX;
use bitrat_core::{ConfigError, OrderingMode, PipelineConfig, TraversalPolicy, WalkStrategy};
use bitrat_hash::{DigestEngine, KeyedNaming};
use bitrat_pipeline::{Destination, Encoding, Output, Template};

use crate::GlobalArgs;

/// Default hash algorithm.
pub const DEFAULT_ALGORITHM: &str = "blake2b";

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// One templated line per file.
    #[default]
    Text,
    /// A postcard-encoded record set.
    Binary,
    /// A JSON record set.
    Json,
}

/// Contents of the settings file. Keys mirror the long flag names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub hmac: Option<String>,
    pub keyed_naming: Option<KeyedNaming>,
    pub parallel: Option<usize>,
    pub name: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub readahead: Option<usize>,
    pub writeahead: Option<usize>,
    pub recursive: Option<bool>,
    pub sort: Option<bool>,
    pub hidden_dirs: Option<bool>,
    pub hidden_files: Option<bool>,
    pub include_vcs: Option<bool>,
    pub alt_walker: Option<bool>,
    pub walk_concurrency: Option<usize>,
    pub stats: Option<bool>,
    pub progress: Option<bool>,
    pub print_format: Option<String>,
    pub output_file: Option<String>,
    pub format: Option<Format>,
    pub attr_prefix: Option<String>,
}

impl Settings {
    /// Load from `explicit`, or from `<config_dir>/bitrat/config.toml`.
    ///
    /// A missing default file yields empty settings; a missing explicit
    /// file, or any malformed file, is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_path(path, true),
            None => match default_path() {
                Some(path) => Self::from_path(&path, false),
                None => Ok(Self::default()),
            },
        }
    }

    fn from_path(path: &Path, required: bool) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if !required && e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("Failed to read settings file {}", path.display())
                });
            }
        };

        let settings = toml::from_str(&text)
            .wrap_err_with(|| format!("Malformed settings file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bitrat").join("config.toml"))
}

/// Fully resolved run options.
#[derive(Debug, Clone)]
pub struct Options {
    pub algorithm: String,
    pub key: Vec<u8>,
    pub naming: KeyedNaming,
    pub policy: TraversalPolicy,
    pub pipeline: PipelineConfig,
    pub print_format: Option<String>,
    pub destination: Destination,
    pub format: Format,
    pub progress: bool,
    pub attr_prefix: String,
    pub default_path: PathBuf,
}

impl Options {
    /// Merge command-line arguments over the settings file.
    pub fn resolve(args: &GlobalArgs, file: Settings) -> Result<Self> {
        let workers = args
            .parallel
            .or(file.parallel)
            .unwrap_or_else(bitrat_core::default_workers);

        let exclude = if args.exclude.is_empty() {
            file.exclude.unwrap_or_default()
        } else {
            args.exclude.clone()
        };

        let policy = TraversalPolicy::builder()
            .pattern(args.name.clone().or(file.name).unwrap_or_default())
            .exclude(exclude)
            .recurse(args.recursive || file.recursive.unwrap_or(false))
            .hidden_dirs(args.hidden_dirs || file.hidden_dirs.unwrap_or(false))
            .hidden_files(args.hidden_files || file.hidden_files.unwrap_or(false))
            .include_vcs(args.include_vcs || file.include_vcs.unwrap_or(false))
            .concurrency(
                args.walk_concurrency
                    .or(file.walk_concurrency)
                    .unwrap_or(workers),
            )
            .build()
            .map_err(|e| eyre!(ConfigError::invalid(e.to_string())))?;

        let ordering = if args.sort || file.sort.unwrap_or(false) {
            OrderingMode::ByPath
        } else {
            OrderingMode::Fifo
        };
        let strategy = if args.alt_walker || file.alt_walker.unwrap_or(false) {
            WalkStrategy::Bounded
        } else {
            WalkStrategy::Sequential
        };

        let mut pipeline = PipelineConfig::builder();
        pipeline
            .workers(workers)
            .ordering(ordering)
            .strategy(strategy)
            .stats(args.stats || file.stats.unwrap_or(false));
        if let Some(readahead) = args.readahead.or(file.readahead) {
            pipeline.readahead(readahead);
        }
        if let Some(writeahead) = args.writeahead.or(file.writeahead) {
            pipeline.writeahead(writeahead);
        }
        let pipeline = pipeline
            .build()
            .map_err(|e| eyre!(ConfigError::invalid(e.to_string())))?;

        Ok(Self {
            algorithm: args
                .hash
                .clone()
                .or(file.hash)
                .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string()),
            key: args
                .hmac
                .clone()
                .or(file.hmac)
                .unwrap_or_default()
                .into_bytes(),
            naming: args.keyed_naming.or(file.keyed_naming).unwrap_or_default(),
            policy,
            pipeline,
            print_format: args.print_format.clone().or(file.print_format),
            destination: args
                .output_file
                .as_deref()
                .or(file.output_file.as_deref())
                .map(Destination::from_arg)
                .unwrap_or_default(),
            format: args.format.or(file.format).unwrap_or_default(),
            progress: args.progress || file.progress.unwrap_or(false),
            attr_prefix: args
                .attr_prefix
                .clone()
                .or(file.attr_prefix)
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            default_path: file.path.unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// Build the digest engine for this run.
    pub fn engine(&self) -> Result<DigestEngine, ConfigError> {
        DigestEngine::with_naming(&self.algorithm, &self.key, self.naming)
    }

    /// Output selection. `default_template` applies when no print format
    /// was configured.
    pub fn output(&self, default_template: &str) -> Result<Output, ConfigError> {
        let destination = self.destination.clone();
        Ok(match self.format {
            Format::Text => Output::Text {
                template: Template::parse(
                    self.print_format.as_deref().unwrap_or(default_template),
                )?,
                destination,
            },
            Format::Binary => Output::Structured {
                encoding: Encoding::Binary,
                destination,
            },
            Format::Json => Output::Structured {
                encoding: Encoding::Json,
                destination,
            },
        })
    }

    /// Roots to walk: the given paths, or the configured base path.
    pub fn roots(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        if paths.is_empty() {
            vec![self.default_path.clone()]
        } else {
            paths.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> GlobalArgs {
        let mut full = vec!["bitrat"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().global
    }

    #[test]
    fn test_parse_settings_file() {
        let settings: Settings = toml::from_str(
            r#"
            hash = "sha256"
            parallel = 6
            recursive = true
            exclude = ["target", "*.tmp"]
            keyed-naming = "unprefixed"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.hash.as_deref(), Some("sha256"));
        assert_eq!(settings.parallel, Some(6));
        assert_eq!(settings.recursive, Some(true));
        assert_eq!(settings.exclude.unwrap().len(), 2);
        assert_eq!(settings.keyed_naming, Some(KeyedNaming::Unprefixed));
        assert_eq!(settings.format, Some(Format::Json));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(toml::from_str::<Settings>("colour = true").is_err());
    }

    #[test]
    fn test_missing_files() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("config.toml");

        let settings = Settings::from_path(&missing, false).unwrap();
        assert!(settings.hash.is_none());

        assert!(Settings::from_path(&missing, true).is_err());
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "parallel = \"many\"").unwrap();

        assert!(Settings::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_defaults() {
        let options = Options::resolve(&args(&[]), Settings::default()).unwrap();

        assert_eq!(options.algorithm, DEFAULT_ALGORITHM);
        assert!(options.key.is_empty());
        assert_eq!(options.naming, KeyedNaming::Prefixed);
        assert_eq!(options.pipeline.readahead, 128);
        assert_eq!(options.pipeline.writeahead, 128);
        assert_eq!(options.pipeline.ordering, OrderingMode::Fifo);
        assert_eq!(options.pipeline.strategy, WalkStrategy::Sequential);
        assert!(!options.policy.recurse);
        assert_eq!(options.destination, Destination::Stdout);
        assert_eq!(options.format, Format::Text);
        assert_eq!(options.attr_prefix, DEFAULT_PREFIX);
        assert_eq!(options.roots(&[]), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_flags_override_file() {
        let file = Settings {
            hash: Some("sha1".to_string()),
            parallel: Some(8),
            readahead: Some(7),
            recursive: Some(true),
            path: Some(PathBuf::from("/data")),
            ..Settings::default()
        };
        let options = Options::resolve(&args(&["-a", "md5", "-j", "3", "-s"]), file).unwrap();

        assert_eq!(options.algorithm, "md5");
        assert_eq!(options.pipeline.workers, 3);
        assert_eq!(options.pipeline.readahead, 7);
        assert_eq!(options.pipeline.ordering, OrderingMode::ByPath);
        assert!(options.policy.recurse);
        assert_eq!(options.policy.concurrency, 3);
        assert_eq!(options.roots(&[]), vec![PathBuf::from("/data")]);
        assert_eq!(
            options.roots(&[PathBuf::from("x")]),
            vec![PathBuf::from("x")]
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Options::resolve(&args(&["-j", "0"]), Settings::default()).is_err());
    }

    #[test]
    fn test_output_selection() {
        let options = Options::resolve(&args(&[]), Settings::default()).unwrap();
        assert!(matches!(
            options.output("{status} {path}").unwrap(),
            Output::Text { .. }
        ));

        let options =
            Options::resolve(&args(&["--format", "json", "-o", "out.json"]), Settings::default())
                .unwrap();
        match options.output("{path}").unwrap() {
            Output::Structured {
                encoding,
                destination,
            } => {
                assert_eq!(encoding, Encoding::Json);
                assert_eq!(destination, Destination::File(PathBuf::from("out.json")));
            }
            other => panic!("unexpected output {other:?}"),
        }

        let options =
            Options::resolve(&args(&["--print-format", "{nope}"]), Settings::default()).unwrap();
        assert!(options.output("{path}").is_err());
    }

    #[test]
    fn test_engine_naming() {
        let options =
            Options::resolve(&args(&["-a", "sha256", "-k", "secret"]), Settings::default())
                .unwrap();
        assert_eq!(options.engine().unwrap().name(), "hmac-sha256");

        let options =
            Options::resolve(&args(&["-a", "crc32", "-k", "secret"]), Settings::default())
                .unwrap();
        assert!(options.engine().is_err());
    }
}
