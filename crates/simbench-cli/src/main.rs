//! simbench - benchmark orchestration for the glasma simulation
//!
//! ## Commands
//!
//! - `run`: resolve a source version, sweep the benchmark matrix and
//!   publish timing documents with provenance
//! - `aggregate`: rebuild the timing documents from a timings directory
//!   (for example one left behind by a failed run)
//! - `known`: list the pinned source releases from a pin file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use simbench_core::{
    aggregate, init_tracing, BenchmarkKind, DeviceKind, RunConfiguration, SweepAxes,
    DEFAULT_FAILURE_TAG,
};
use simbench_sweep::{ProcessInvoker, Session, SessionFailure, SessionOptions, SourceConfig};
use source_resolver::{CompatFamily, HttpFetcher, KnownDigests, UpstreamConfig, LATEST};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "simbench")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Timed parameter sweeps of the glasma simulation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark sweep
    Run(RunArgs),

    /// Rebuild compile_timings.json and run_timings.json from a timings directory
    Aggregate {
        /// Directory holding <label>.jsonl and <label>_compile.json files
        timings: PathBuf,

        /// Device the timings were taken on
        #[arg(short, long)]
        device: DeviceKind,

        /// Where to write the documents (default: parent of the timings directory)
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// List pinned source releases
    Known {
        /// Pinned digests (TOML)
        #[arg(long, env = "SIMBENCH_KNOWN_DIGESTS")]
        known_digests: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Device kind: cuda, numba or cython
    #[arg(short, long, default_value = "cuda")]
    device: DeviceKind,

    /// Benchmark kind: all, init, evolve, full or test
    #[arg(short, long, default_value = "all")]
    kind: BenchmarkKind,

    /// Source version: `latest`, a published tag, or a local archive path
    #[arg(short, long, default_value = LATEST)]
    source: String,

    /// Accept an archive whose digest is not pinned, under this label
    #[arg(long)]
    force_label: Option<String>,

    /// Fast-math in the workload (0 or 1)
    #[arg(short = 'f', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    fastmath: u8,

    /// Repetitions per sweep point
    #[arg(short = 'n', long, default_value_t = 2)]
    repeat: u32,

    /// Output root; each run gets its own subdirectory
    #[arg(short, long, env = "SIMBENCH_OUTPUT")]
    output: PathBuf,

    /// Scratch root for run workspaces
    #[arg(short = 'w', long, env = "SIMBENCH_SCRATCH")]
    scratch: PathBuf,

    /// Virtualenv directory or Python interpreter (default: python3)
    #[arg(short = 'e', long = "env", env = "SIMBENCH_PYTHON")]
    python: Option<PathBuf>,

    /// Sweep axes file (TOML) replacing the default matrix
    #[arg(long)]
    axes: Option<PathBuf>,

    /// Pinned digests (TOML); without it only `latest` and forced
    /// local archives resolve
    #[arg(long, env = "SIMBENCH_KNOWN_DIGESTS")]
    known_digests: Option<PathBuf>,

    /// Helper scripts copied into the source tree's examples/ directory
    #[arg(long, env = "SIMBENCH_SCRIPTS")]
    scripts: Option<PathBuf>,

    /// Keep the workspace (source tree and backups) after the run
    #[arg(long)]
    retain_scratch: bool,

    /// Suffix for directories left by a failed run
    #[arg(long, default_value = DEFAULT_FAILURE_TAG)]
    failure_tag: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args, cli.json).await,
        Commands::Aggregate {
            timings,
            device,
            dest,
        } => cmd_aggregate(&timings, device, dest.as_deref()),
        Commands::Known { known_digests } => cmd_known(known_digests.as_deref(), cli.json),
    }
}

fn load_known(pins: Option<&Path>) -> Result<KnownDigests> {
    match pins {
        Some(path) => KnownDigests::from_file(path)
            .with_context(|| format!("Failed to load known digests from {:?}", path)),
        None => Ok(KnownDigests::empty()),
    }
}

async fn cmd_run(args: RunArgs, json: bool) -> Result<()> {
    let axes = match &args.axes {
        Some(path) => SweepAxes::from_toml_file(path)?,
        None => SweepAxes::default(),
    };
    let config = RunConfiguration::new(
        args.device,
        args.fastmath == 1,
        args.repeat,
        args.kind,
        axes,
    )?;

    let sources = SourceConfig {
        known: load_known(args.known_digests.as_deref())?,
        upstream: UpstreamConfig::from_env(),
        fetcher: Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?),
    };

    let mut options = SessionOptions::new(args.output, args.scratch);
    options.version = args.source;
    options.force_label = args.force_label;
    options.python = args.python;
    options.scripts_dir = args.scripts;
    options.retain_scratch = args.retain_scratch;
    options.failure_tag = args.failure_tag;
    options.show_progress = !json && std::io::stderr().is_terminal();
    options.invocation = std::env::args().collect();

    let session = Session::new(config, options, sources, Arc::new(ProcessInvoker));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match session.run(shutdown).await {
        Ok(outcome) => {
            info!(run_id = %outcome.run_id, points = outcome.points, "run complete");
            println!(
                "Run {} complete: {} points, version {}",
                outcome.run_id, outcome.points, outcome.version_label
            );
            println!("Sweep identity: {}", outcome.sweep_digest);
            println!("Results:        {}", outcome.output_dir.display());
            Ok(())
        }
        Err(failure) => {
            report_failure(&failure);
            Err(failure.into())
        }
    }
}

fn report_failure(failure: &SessionFailure) {
    eprintln!(
        "Run {} failed during {}: {}",
        failure.run_id,
        failure.error.stage(),
        failure.error
    );
    for (_, to) in &failure.recovery.renamed {
        eprintln!("  kept: {}", to.display());
    }
}

fn cmd_aggregate(timings: &Path, device: DeviceKind, dest: Option<&Path>) -> Result<()> {
    let dest = match dest {
        Some(d) => d.to_path_buf(),
        None => timings
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let results = aggregate(timings, device)
        .with_context(|| format!("Failed to aggregate timings in {:?}", timings))?;
    let (compile, run) = results.write_to(&dest)?;
    println!("Categories: {}", results.run_labels().join(", "));
    println!("Wrote {}", compile.display());
    println!("Wrote {}", run.display());
    Ok(())
}

#[derive(Serialize)]
struct KnownEntry<'a> {
    family: &'a str,
    tag: &'a str,
    sha256: String,
}

fn cmd_known(pins: Option<&Path>, json: bool) -> Result<()> {
    let known = load_known(pins)?;
    let entries: Vec<KnownEntry> = [CompatFamily::NumbaCuda, CompatFamily::Cython]
        .iter()
        .flat_map(|f| known.family(*f))
        .map(|r| KnownEntry {
            family: r.family.as_str(),
            tag: &r.tag,
            sha256: r.digest.to_hex(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No pinned releases. Pass --known-digests <file.toml>.");
        return Ok(());
    }
    for e in &entries {
        println!("{:<12} {:<10} {}", e.family, e.tag, e.sha256);
    }
    Ok(())
}
