//! morread CLI
//!
//! Inspect merge-on-read splits from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use morread::log::{LogBlock, LogReader};
use morread::{
    FieldKeyExtractor, FileSplit, JobConf, LogFile, RealtimeReader, ReaderConfig, RecordIterator,
    REALTIME_SKIP_MERGE_PROP,
};
use tracing_subscriber::{fmt, EnvFilter};

/// morread CLI
#[derive(Parser, Debug)]
#[command(name = "morread")]
#[command(about = "Read merge-on-read file splits")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the records of a split
    Cat {
        /// Base row file
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Commit instant of the base file
        #[arg(long, default_value = "0")]
        base_instant: u64,

        /// Log file as PATH or PATH@INSTANT, in write order (repeatable)
        #[arg(short, long = "log")]
        logs: Vec<String>,

        /// Record key field
        #[arg(short, long, default_value = "id")]
        key_field: String,

        /// Precombine (ordering) field
        #[arg(short, long)]
        ordering_field: Option<String>,

        /// Read base and log without merging
        #[arg(long)]
        skip_merge: bool,

        /// Merge map memory limit in MB before spilling
        #[arg(short = 'm', long, default_value = "64")]
        max_memory_mb: usize,

        /// Directory for spill files
        #[arg(long)]
        spill_dir: Option<PathBuf>,
    },

    /// List the blocks of a log file
    Blocks {
        /// Log file
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,morread=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Cat {
            base,
            base_instant,
            logs,
            key_field,
            ordering_field,
            skip_merge,
            max_memory_mb,
            spill_dir,
        } => {
            let mut config = ReaderConfig::builder().max_memory_mb(max_memory_mb);
            if let Some(dir) = spill_dir {
                config = config.spill_dir(dir);
            }
            let mut extractor = FieldKeyExtractor::new(key_field);
            if let Some(field) = ordering_field {
                extractor = extractor.with_ordering(field);
            }
            cat(base, base_instant, &logs, Arc::new(extractor), skip_merge, config.build())
        }
        Commands::Blocks { path } => blocks(path),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Parse `PATH` or `PATH@INSTANT`
fn parse_log_arg(arg: &str, default_instant: u64) -> morread::Result<LogFile> {
    match arg.rsplit_once('@') {
        Some((path, instant)) => {
            let instant = instant.parse().map_err(|_| {
                morread::MorError::Config(format!("invalid instant in log argument {:?}", arg))
            })?;
            Ok(LogFile::new(path, instant))
        }
        None => Ok(LogFile::new(arg, default_instant)),
    }
}

fn cat(
    base: Option<PathBuf>,
    base_instant: u64,
    logs: &[String],
    extractor: Arc<FieldKeyExtractor>,
    skip_merge: bool,
    config: ReaderConfig,
) -> morread::Result<()> {
    let log_files = logs
        .iter()
        .map(|arg| parse_log_arg(arg, base_instant))
        .collect::<morread::Result<Vec<_>>>()?;

    let split = match base {
        Some(path) => FileSplit::new(path, base_instant, log_files),
        None => FileSplit::log_only(log_files),
    };

    let job = JobConf::new().with(REALTIME_SKIP_MERGE_PROP, skip_merge.to_string());
    let mut reader = RealtimeReader::open(&split, &job, config, extractor)?;

    let mut key = reader.create_key_placeholder();
    let mut value = reader.create_value_placeholder();
    while reader.advance_into(&mut key, &mut value)? {
        println!("{}\t{}", key, value);
    }

    tracing::info!(
        "Read {} records ({})",
        reader.position(),
        if reader.is_merging() { "merged" } else { "unmerged" }
    );
    reader.close()
}

fn blocks(path: PathBuf) -> morread::Result<()> {
    let mut reader = LogReader::open(&path)?;

    loop {
        let offset = reader.offset();
        let block = match reader.read_next_block() {
            Ok(Some(block)) => block,
            Ok(None) => break,
            Err(e) if e.is_corrupt_block() => {
                println!("{:>10}  CORRUPT  {}", offset, e);
                break;
            }
            Err(e) => return Err(e),
        };

        let detail = match &block {
            LogBlock::Data { records, .. } => format!("{} records", records.len()),
            LogBlock::Delete { keys, .. } => format!("{} keys", keys.len()),
            LogBlock::Rollback { target_instant, .. } => format!("target {}", target_instant),
            LogBlock::Command { command, .. } => format!("{:?}", command),
        };
        println!(
            "{:>10}  {:<8}  instant {:<16} {}",
            offset,
            format!("{:?}", block.block_type()),
            block.instant(),
            detail
        );
    }

    if reader.was_truncated() {
        println!("{:>10}  TRUNCATED", reader.offset());
    }
    Ok(())
}
