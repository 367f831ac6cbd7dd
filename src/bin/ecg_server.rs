//! ECG simulation server: streams synthetic readings to every client on `/ecg`.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

use ecg_monitor::config::Config;
use ecg_monitor::logging::{self, LogSinks};
use ecg_monitor::session::{self, AppState};

#[derive(Parser)]
#[command(name = "ecg-server")]
#[command(about = "Stream simulated ECG readings over WebSocket", long_about = None)]
struct Cli {
    /// HTTP service address
    #[arg(long)]
    addr: Option<String>,

    /// General log file
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Alerts-only log file
    #[arg(long)]
    alertlog: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
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
    if let Some(path) = cli.logfile {
        config.general_log = path;
    }
    if let Some(path) = cli.alertlog {
        config.alert_log = path;
    }

    let sinks = match LogSinks::setup(&config.general_log, &config.alert_log) {
        Ok(sinks) => sinks,
        Err(e) => {
            log::error!("Failed to setup logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    sinks.info(&format!("Starting ECG Simulation Server on {}", config.address));

    match TcpListener::bind(&config.address).await {
        Ok(listener) => {
            let state = AppState::new(sinks.clone(), config.push_interval());
            if let Err(e) = session::serve(listener, state, session::shutdown_signal()).await {
                sinks.info(&format!("HTTP server error: {}", e));
            }
        }
        Err(e) => sinks.info(&format!("HTTP server error: {}", e)),
    }

    sinks.info("Shutting down server...");
    sinks.close();
    ExitCode::SUCCESS
}
