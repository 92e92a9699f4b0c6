//! siakad - command-line shell for the academic administration dashboard.
//!
//! Signs staff in against the backend, keeps the session shared between every
//! running instance, and opens dashboard pages through the route guard.

mod app;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Log file name prefix in the storage directory
const LOG_FILE: &str = "siakad.log";

const USAGE: &str = "\
Usage: siakad <command>

Commands:
  login [username]   Sign in to the backend
  logout             Sign out everywhere
  status             Show who is signed in
  open <path>        Open a page, e.g. /students
  watch              Follow session changes made by other instances
  routes             List the dashboard pages";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when a log directory is known, to a daily file.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_dir = siakad_core::Config::load()
        .ok()
        .and_then(|config| config.storage_dir().ok());
    let _log_guard = init_tracing(log_dir.as_deref());
    info!("siakad starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    if matches!(command, None | Some("help" | "--help" | "-h")) {
        println!("{}", USAGE);
        return Ok(());
    }
    if command == Some("routes") {
        for route in siakad_core::Route::ALL {
            println!("{:<16} {}", route.path(), route.title());
        }
        return Ok(());
    }

    let mut app = App::new()?;

    match (command, args.get(1)) {
        (Some("login"), username) => app.login(username.cloned()).await?,
        (Some("logout"), _) => app.logout()?,
        (Some("status"), _) => app.status(),
        (Some("open"), Some(path)) => app.open(path).await?,
        (Some("watch"), _) => app.watch().await?,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    info!("siakad shutting down");
    Ok(())
}
