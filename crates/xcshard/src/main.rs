use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use mimalloc::MiMalloc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use xcshard_schedule::report::{abbreviated_arguments, build_report, write_json};
use xcshard_schedule::{ArgumentDialect, ShardPlanner, load_options};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Balance test classes across parallel workers using historical timings.
///
/// Reads xctool `json-stream` timing files and prints, for every worker,
/// the test-runner arguments selecting its share of the tests.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Number of workers to shard across
    worker_count: usize,

    /// `json-stream` file with historical test timings
    historical_timings: PathBuf,

    /// `json-stream` file listing the tests that exist today
    current_tests: Option<PathBuf>,

    /// Comma separated list of targets. Can be used multiple times.
    #[arg(short, long = "partition", value_name = "TARGETS", required = true)]
    partitions: Vec<String>,

    /// JSON array of options, one object per partition
    #[arg(long, value_name = "FILE")]
    partition_options: Option<PathBuf>,

    /// Allocate fewer shards than workers when partitions run out of tests
    #[arg(long)]
    allow_fewer_shards: bool,

    /// Output file path (writes to stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit only the per-shard argument lists
    #[arg(short, long)]
    abbrev: bool,

    /// Format arguments for xcodebuild instead of xctool
    #[arg(short = 'x', long)]
    xcodebuild_output: bool,

    /// Emit xcodebuild `-skip-testing` arguments (implies -x)
    #[arg(long)]
    skip_testing: bool,

    /// Select a whole target with one argument when a shard runs all of it
    #[arg(long)]
    collapse_targets: bool,
}

impl Cli {
    fn dialect(&self) -> ArgumentDialect {
        if self.skip_testing {
            ArgumentDialect::XcodebuildSkip
        } else if self.xcodebuild_output {
            ArgumentDialect::Xcodebuild {
                collapse_targets: self.collapse_targets,
            }
        } else {
            ArgumentDialect::Xctool
        }
    }

    fn planner(&self) -> Result<ShardPlanner> {
        let partitions = self
            .partitions
            .iter()
            .map(|p| p.split(',').filter(|t| !t.is_empty()));
        let mut planner = ShardPlanner::new(self.worker_count, partitions)
            .with_allow_fewer_shards(self.allow_fewer_shards);
        if let Some(path) = &self.partition_options {
            planner = planner.with_options(load_options(path)?);
        }
        Ok(planner)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean for piping.
    const CRATES: &[&str] = &["xcshard", "xcshard_schedule", "xcshard_schemas"];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .init();

    let planner = cli.planner()?;
    let result = planner.compute_shards_for_files(
        &cli.historical_timings,
        cli.current_tests.as_deref(),
    )?;
    let dialect = cli.dialect();
    debug!(?dialect, abbrev = cli.abbrev, "rendering shards");

    let stdout = std::io::stdout();
    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(stdout.lock()),
    };
    if cli.abbrev {
        write_json(&abbreviated_arguments(&result, dialect), &mut writer)?;
    } else {
        let report =
            build_report(&result, cli.worker_count, &cli.partitions, dialect);
        write_json(&report, &mut writer)?;
    }
    writer.flush()?;
    drop(writer);

    if let Some(path) = &cli.output {
        println!("Wrote file to: {}", path.display());
    }
    Ok(())
}
