mod calc;
mod db;
mod ipc;
mod records;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// pondokd: record and statistics sidecar for the pesantren dashboard.
///
/// Reads one JSON request per line on stdin and writes one JSON response per
/// line on stdout. Logs go to stderr.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Workspace directory to open at startup. Can also be chosen later with
    /// the `workspace.select` method.
    #[arg(long, env = "PONDOKD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "PONDOKD_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pondokd starting");

    let mut state = ipc::AppState::default();
    if let Some(path) = args.workspace.as_deref() {
        // A bad startup workspace leaves the daemon up; the shell can select another.
        if let Err(e) = state.open_workspace(path) {
            tracing::error!(workspace = %path.to_string_lossy(), error = %format!("{:#}", e), "failed to open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed, shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed request line");
                // No id to echo back.
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(stdout, "{}", resp);
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}
