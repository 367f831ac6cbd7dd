//! ECG monitoring client: prints a live table and raises alerts.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use ecg_monitor::config::Config;
use ecg_monitor::ingest::{self, IngestExit, Monitor};
use ecg_monitor::logging;

#[derive(Parser)]
#[command(name = "ecg-client")]
#[command(about = "Monitor a simulated ECG stream", long_about = None)]
struct Cli {
    /// HTTP service address
    #[arg(long)]
    addr: Option<String>,

    /// Minimum severity for beep alerts (normal, warning, critical)
    #[arg(long)]
    minseverity: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Do not print alert lines below the table
    #[arg(long)]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_console();
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("{}; using defaults", e);
        Config::default()
    });
    if let Some(addr) = cli.addr {
        config.address = addr;
    }
    if let Some(min) = cli.minseverity {
        config.min_severity = min;
    }
    if cli.no_color {
        config.use_color = false;
    }

    let monitor = Monitor::console(config.use_color, &config.min_severity, cli.quiet);
    let table = *monitor.table();
    println!("{}", table.banner());

    let ws = match ingest::connect(&config.address).await {
        Ok(ws) => ws,
        Err(e) => {
            log::error!("dial: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", table.started());
    println!("{}", table.header());

    let mut monitor = monitor;
    let exit = ingest::run(ws, move |reading| {
        monitor.process(reading);
    }, interrupted())
    .await;

    println!("{}", table.footer());
    match exit {
        Ok(IngestExit::ServerClosed) => {
            println!("Connection closed");
            ExitCode::SUCCESS
        }
        Ok(IngestExit::Interrupted) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
