#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use clap::{Parser, builder::RangedU64ValueParser};
use indicatif::{ProgressBar, ProgressStyle};
use playlist::{load_playlist, parser::parse};
use probe::{DEFAULT_USER_AGENT, PREFIX_BYTES, ProbeOptions, fetch::ReqwestFetcher};
use report::{Report, ReportFormat, write_reports};
use scheduler::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use util::{init_http_client, spawn_ct_watcher, warn_ulimit};

pub mod playlist;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod util;

/// Checks every stream of an M3U playlist and reports which ones are live
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Playlist URL or local file path
    #[arg(env = "M3U_PROBE_PLAYLIST")]
    playlist: String,

    /// Directory where the reports are written
    #[arg(short, long, default_value = ".", env = "M3U_PROBE_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// File name prefix of the reports
    #[arg(long, default_value = "m3u_check", env = "M3U_PROBE_PREFIX")]
    prefix: String,

    /// The amount of parallel probes
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_CONCURRENCY,
        env = "M3U_PROBE_WORKERS",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CONCURRENCY as u64)
    )]
    workers: usize,

    /// Timeout for each HTTP request, in seconds
    #[arg(short, long, default_value_t = 10, env = "M3U_PROBE_TIMEOUT")]
    timeout: u64,

    /// User-Agent sent unless an entry carries its own `|User-Agent=` override
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "M3U_PROBE_USER_AGENT")]
    user_agent: String,

    /// Report formats to write, may be repeated [default: all]
    #[arg(short, long = "format", value_enum)]
    formats: Vec<ReportFormat>,

    /// Also append the log, without colors, to this file
    #[arg(long, env = "M3U_PROBE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn report_formats(&self) -> Vec<ReportFormat> {
        if self.formats.is_empty() {
            return ReportFormat::all().to_vec();
        }
        let mut formats = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            if !formats.contains(format) {
                formats.push(*format);
            }
        }
        formats
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    // Still overridable via RUST_LOG
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn"));

    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|file| fmt::layer().with_ansi(false).with_writer(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Installing the log subscriber")
}

fn open_log_file(path: &Path) -> Result<Arc<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Opening log file {}", path.display()))?;
    Ok(Arc::new(file))
}

async fn run(args: Args) -> Result<()> {
    warn_ulimit(args.workers);

    let timeout = Duration::from_secs(args.timeout);
    let client = init_http_client(&args.user_agent, timeout)?;
    let ct = CancellationToken::new();

    spawn_ct_watcher(ct.clone());

    let text = load_playlist(&client, &args.playlist, timeout).await?;
    let entries = parse(&text);
    ensure!(!entries.is_empty(), "No valid streams found in the M3U playlist.");

    let total = entries.len();
    info!(
        "Found {total} streams to check with {} parallelism",
        args.workers
    );

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})") {
        pb.set_style(style);
    }

    let scheduler = Scheduler::new(
        args.workers,
        ProbeOptions {
            timeout,
            user_agent: args.user_agent.clone(),
            max_bytes: PREFIX_BYTES,
        },
    )
    .with_progress(pb)
    .with_cancellation(ct);

    let results = scheduler
        .run_all(Arc::new(ReqwestFetcher::new(client)), entries)
        .await?;

    let report = Report::new(&results, total);
    write_reports(&report, &args.output_dir, &args.prefix, &args.report_formats()).await?;

    info!(
        "Done! {} live streams found out of {} total.",
        report.summary.live, report.summary.total
    );

    Ok(())
}
