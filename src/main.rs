//! bitrat - Lightning-fast, multi-algorithm file checksums.
//!
//! Usage:
//!   bitrat [PATHS]...              Hash files (same as `bitrat hash`)
//!   bitrat stdin                   Hash standard input
//!   bitrat list-algorithms         List supported algorithms
//!   bitrat attr check [PATHS]...   Compare against digests stored in xattrs
//!   bitrat attr set [PATHS]...     Store digests in xattrs
//!   bitrat --help                  Show help

mod settings;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use itertools::Itertools;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use bitrat_attr::{AttrReader, AttrRemover, AttrTarget, AttrVerifier, AttrWriter, XattrStore};
use bitrat_core::{DigestRecord, FileRecord, Processor, RunStats};
use bitrat_hash::{DigestEngine, KeyedNaming, list_algorithms};
use bitrat_pipeline::{
    DEFAULT_TEMPLATE, HashProgress, Output, Pipeline, Renderer, STATUS_TEMPLATE,
};

use settings::{Format, Options, Settings};

#[derive(Parser)]
#[command(
    name = "bitrat",
    version,
    about = "Lightning-fast, multi-algorithm file checksums",
    long_about = "bitrat hashes files with a pool of parallel workers.\n\n\
                  Digests can be stored in extended attributes and checked \
                  later to detect silent corruption."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Paths to hash (defaults to the configured base path)
    paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Options shared by every subcommand.
#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Settings file (default: <config dir>/bitrat/config.toml)
    #[arg(long, global = true, env = "BITRAT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print throughput statistics
    #[arg(long, global = true, env = "BITRAT_STATS")]
    stats: bool,

    /// Print progress to stderr
    #[arg(long, global = true, env = "BITRAT_PROGRESS")]
    progress: bool,

    /// Line template: {hash}, {path}, {status}, {size}
    #[arg(long, global = true, env = "BITRAT_PRINT_FORMAT")]
    print_format: Option<String>,

    /// Output file ("-" for stdout)
    #[arg(short, long, global = true, env = "BITRAT_OUTPUT_FILE")]
    output_file: Option<String>,

    /// Output format
    #[arg(long, global = true, env = "BITRAT_FORMAT")]
    format: Option<Format>,

    /// Hash algorithm (see `list-algorithms`)
    #[arg(short = 'a', long, global = true, env = "BITRAT_HASH")]
    hash: Option<String>,

    /// Key for keyed hashing
    #[arg(short = 'k', long, global = true, env = "BITRAT_HMAC", hide_env_values = true)]
    hmac: Option<String>,

    /// Reported names for inherently keyed algorithms
    #[arg(long, global = true, env = "BITRAT_KEYED_NAMING")]
    keyed_naming: Option<KeyedNaming>,

    /// Number of parallel hashers
    #[arg(short = 'j', long, global = true, env = "BITRAT_PARALLEL")]
    parallel: Option<usize>,

    /// File name glob pattern
    #[arg(short = 'n', long, global = true, env = "BITRAT_NAME")]
    name: Option<String>,

    /// Exclude entries whose name matches a glob (repeatable)
    #[arg(
        short = 'e',
        long,
        global = true,
        env = "BITRAT_EXCLUDE",
        value_delimiter = ','
    )]
    exclude: Vec<String>,

    /// Traversal queue capacity
    #[arg(long, global = true, env = "BITRAT_READAHEAD")]
    readahead: Option<usize>,

    /// Digest queue capacity
    #[arg(long, global = true, env = "BITRAT_WRITEAHEAD")]
    writeahead: Option<usize>,

    /// Recurse into directories
    #[arg(short = 'r', long, global = true, env = "BITRAT_RECURSIVE")]
    recursive: bool,

    /// Sort output by path
    #[arg(short = 's', long, global = true, env = "BITRAT_SORT")]
    sort: bool,

    /// Descend into hidden directories
    #[arg(long, global = true, env = "BITRAT_HIDDEN_DIRS")]
    hidden_dirs: bool,

    /// Hash hidden files
    #[arg(long, global = true, env = "BITRAT_HIDDEN_FILES")]
    hidden_files: bool,

    /// Descend into version control directories
    #[arg(long, global = true, env = "BITRAT_INCLUDE_VCS")]
    include_vcs: bool,

    /// Walk directories concurrently
    #[arg(long, global = true, env = "BITRAT_ALT_WALKER")]
    alt_walker: bool,

    /// Directories listed at once by the concurrent walker
    #[arg(long, global = true, env = "BITRAT_WALK_CONCURRENCY")]
    walk_concurrency: Option<usize>,

    /// Extended attribute name prefix
    #[arg(long, global = true, env = "BITRAT_ATTR_PREFIX")]
    attr_prefix: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Hash files
    Hash {
        /// Paths to hash
        paths: Vec<PathBuf>,
    },

    /// Hash standard input
    Stdin,

    /// List supported hash algorithms
    ListAlgorithms,

    /// Manage digests stored in extended attributes
    Attr {
        #[command(subcommand)]
        action: AttrCommand,
    },
}

#[derive(Subcommand)]
enum AttrCommand {
    /// Print stored digests
    Get { paths: Vec<PathBuf> },
    /// Hash files and store their digests
    Set { paths: Vec<PathBuf> },
    /// Hash files and compare against stored digests
    Check { paths: Vec<PathBuf> },
    /// Remove stored digests
    Remove { paths: Vec<PathBuf> },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.global.verbose);

    let settings = Settings::load(cli.global.config.as_deref())?;
    let options = Options::resolve(&cli.global, settings)?;

    match cli.command {
        None => run_hash(&options, &cli.paths),
        Some(Command::Hash { paths }) => run_hash(&options, &paths),
        Some(Command::Stdin) => run_stdin(&options),
        Some(Command::ListAlgorithms) => {
            println!("{}", list_algorithms().join("\n"));
            Ok(())
        }
        Some(Command::Attr { action }) => run_attr(&options, action),
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Hash files and print their digests.
fn run_hash(options: &Options, paths: &[PathBuf]) -> Result<()> {
    let engine = options.engine()?;
    let renderer = options
        .output(DEFAULT_TEMPLATE)?
        .into_renderer(engine.name())?;
    run_pipeline(options, paths, engine, renderer)
}

/// Hash standard input.
fn run_stdin(options: &Options) -> Result<()> {
    let mut engine = options.engine()?;
    let record = stream_record(&mut engine, io::stdin().lock())?;
    let mut renderer = options
        .output(DEFAULT_TEMPLATE)?
        .into_renderer(engine.name())?;
    renderer.render(&record)?;
    renderer.finish(None)?;
    Ok(())
}

fn stream_record(engine: &mut DigestEngine, reader: impl io::Read) -> Result<DigestRecord> {
    let digest = engine
        .hash_stream(reader)
        .wrap_err("Failed to read stdin")?;
    Ok(DigestRecord::new(
        FileRecord::new("(stdin)"),
        digest,
        engine.name(),
    ))
}

fn run_attr(options: &Options, action: AttrCommand) -> Result<()> {
    if !XattrStore::is_supported() {
        bail!("Extended attributes are not supported on this platform");
    }

    let engine = options.engine()?;
    let target = AttrTarget::new(
        Arc::new(XattrStore::new()),
        &options.attr_prefix,
        engine.name(),
    );
    debug!(attribute = target.name(), "Using extended attribute");

    let algorithm = engine.name().to_string();
    match action {
        AttrCommand::Get { paths } => {
            let renderer = options
                .output(DEFAULT_TEMPLATE)?
                .into_renderer(&algorithm)?;
            run_pipeline(options, &paths, AttrReader::new(target), renderer)
        }
        AttrCommand::Set { paths } => {
            let renderer = options
                .output(STATUS_TEMPLATE)?
                .into_renderer(&algorithm)?;
            run_pipeline(options, &paths, AttrWriter::new(engine, target), renderer)
        }
        AttrCommand::Check { paths } => {
            let renderer = options
                .output(STATUS_TEMPLATE)?
                .into_renderer(&algorithm)?;
            run_pipeline(options, &paths, AttrVerifier::new(engine, target), renderer)
        }
        AttrCommand::Remove { paths } => {
            let renderer = Output::Discard.into_renderer(&algorithm)?;
            run_pipeline(options, &paths, AttrRemover::new(target), renderer)
        }
    }
}

fn run_pipeline<P>(
    options: &Options,
    paths: &[PathBuf],
    processor: P,
    renderer: Box<dyn Renderer>,
) -> Result<()>
where
    P: Processor + Clone,
{
    let roots = options.roots(paths);
    let pipeline = Pipeline::new(options.pipeline.clone(), options.policy.clone());

    let progress = if options.progress {
        let rx = pipeline.subscribe();
        Some(
            thread::Builder::new()
                .name("progress".to_string())
                .spawn(move || print_progress(rx))
                .wrap_err("Failed to start progress reporter")?,
        )
    } else {
        None
    };

    let result = pipeline.run(&roots, processor, renderer);
    // Closes the progress channel if the run failed before its final update
    drop(pipeline);
    if let Some(handle) = progress {
        join_progress(handle);
    }
    let report = result.wrap_err("Hashing failed")?;

    if options.pipeline.stats {
        print_summary(&report.stats);
    }
    if report.walk.errors > 0 || report.stats.errors > 0 {
        warn!(
            walk_errors = report.walk.errors,
            file_errors = report.stats.errors,
            "Completed with errors"
        );
    }

    Ok(())
}

/// Wait for the progress reporter. Returns `false` if it panicked.
fn join_progress(handle: thread::JoinHandle<()>) -> bool {
    let clean = handle.join().is_ok();
    if !clean {
        warn!("Progress reporter panicked");
    }
    clean
}

fn print_progress(mut rx: broadcast::Receiver<HashProgress>) {
    loop {
        match rx.blocking_recv() {
            Ok(progress) => {
                eprintln!(
                    "# {} files, {} ({:.0} files/s, {}/s) {}",
                    progress.files,
                    format_size(progress.bytes),
                    progress.files_per_second(),
                    format_size(progress.bytes_per_second() as u64),
                    progress.current_path.display()
                );
                if progress.done {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_summary(stats: &RunStats) {
    eprintln!(
        "# hashed {} ({} bytes) from {} files in {:.2?} ({:.2?} cpu over {} workers) => {:.1} MB/s",
        format_size(stats.bytes),
        stats.bytes,
        stats.files,
        stats.elapsed,
        stats.cpu_time,
        stats.workers,
        stats.megabytes_per_second()
    );
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrat_pipeline::Template;

    #[test]
    fn test_stdin_line() {
        let mut engine = DigestEngine::new("sha256", b"").unwrap();
        let record = stream_record(&mut engine, &b"hello"[..]).unwrap();
        assert_eq!(
            Template::default().render(&record),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  (stdin)"
        );
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["bitrat", "-r", "attr", "check", "a", "b"]).unwrap();
        assert!(cli.global.recursive);
        match cli.command {
            Some(Command::Attr {
                action: AttrCommand::Check { paths },
            }) => assert_eq!(paths, vec![PathBuf::from("a"), PathBuf::from("b")]),
            _ => panic!("expected attr check"),
        }

        let cli = Cli::try_parse_from(["bitrat", "some/dir", "--sort"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.global.sort);
        assert_eq!(cli.paths, vec![PathBuf::from("some/dir")]);
    }

    #[test]
    fn test_progress_panic_is_reported() {
        let panicked = thread::spawn(|| panic!("reporter failed"));
        assert!(!join_progress(panicked));
        assert!(join_progress(thread::spawn(|| ())));
    }

    #[test]
    fn test_summary_size_format() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(2048), "2 KiB");
    }
}
