use anyhow::Context;
use buddy_core::config::LoggingConfig;
use buddy_core::BuddyConfig;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

mod cycle;
mod frame;

use cycle::Orchestrator;
use frame::SensorFrame;

/// Reads one JSON sensor frame per stdin line and writes one JSON cycle
/// report per stdout line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "buddy.toml")]
    config: PathBuf,

    /// Override the directory persisted state lives in
    #[arg(long, env = "BUDDY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Do not run the background consolidation worker
    #[arg(long)]
    no_worker: bool,

    /// Seed for reproducible behavior
    #[arg(long)]
    seed: Option<u64>,
}

/// Install the stderr subscriber and, when configured, a daily rolling
/// file. The returned guard must live as long as logging is wanted.
fn init_logging(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr = if cfg.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file, guard) = match &cfg.file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "buddy.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(filter).with(stderr).with(file).init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BuddyConfig::load_or_default(&args.config);
    if let Some(dir) = args.data_dir {
        config.paths.data_dir = dir;
    }
    let _log_guard = init_logging(&config.logging);

    info!(data_dir = %config.paths.data_dir.display(), "Starting Buddy");

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut buddy = Orchestrator::new(&config, rng);
    buddy.start(!args.no_worker);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: SensorFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping malformed sensor frame: {}", e);
                continue;
            }
        };

        let report = buddy.process(frame).await;
        let mut out = serde_json::to_string(&report)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    buddy.shutdown().await;
    Ok(())
}
