// ABOUTME: Main entry point for the netpulse network monitor
// ABOUTME: Parses the CLI, loads configuration, sets up file logging, and starts the TUI or a one-shot report

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod adapters;
mod app;
mod config;
mod engine;
mod history;
mod probe;
mod quality;
mod sampler;
mod source;
mod tui;

use app::{App, Monitor};
use config::{Config, Overrides, ViewMode};
use source::SysinfoSource;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Simple,
    Advanced,
}

impl From<ModeArg> for ViewMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simple => ViewMode::Simple,
            ModeArg::Advanced => ViewMode::Advanced,
        }
    }
}

#[derive(Parser)]
#[command(name = "netpulse", version)]
#[command(about = "Live network throughput and latency for this machine")]
struct Cli {
    /// Configuration file path (created with defaults if missing)
    #[arg(short, long, default_value = "netpulse.toml")]
    config: PathBuf,

    /// Host to ping for latency
    #[arg(long)]
    host: Option<String>,

    /// Stats sampling interval in milliseconds
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Latency probe interval in milliseconds
    #[arg(long)]
    probe_interval: Option<u64>,

    /// Initial view
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Print one report to stdout instead of starting the TUI
    #[arg(long)]
    once: bool,

    /// Log file path
    #[arg(long, default_value_os_t = std::env::temp_dir().join("netpulse.log"))]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ping_host: self.host.clone(),
            stats_interval_ms: self.stats_interval,
            probe_interval_ms: self.probe_interval,
            mode: self.mode.map(ViewMode::from),
        }
    }
}

/// Logs go to a file; stdout belongs to the TUI.
fn setup_tracing(log_file: &Path, verbose: u8) -> WorkerGuard {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netpulse={level}")));

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("netpulse.log"));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_tracing(&cli.log_file, cli.verbose);

    let mut config = Config::load_or_create(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "using default configuration");
        Config::default()
    });
    let overrides = cli.overrides();
    overrides.apply(&mut config);

    let source = Box::new(SysinfoSource::new());

    if cli.once {
        let mut monitor = Monitor::new(config, source);
        let view = monitor.sample_once().await;
        println!("{}", view.summary());
        return Ok(());
    }

    let app = App::new(config, cli.config, overrides, source)?;
    app.run().await
}
