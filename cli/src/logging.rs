//! Tracing subscriber for the CLI.
//!
//! Filter comes from `RUST_LOG` (default `warn`; `--verbose` adds `showroom=debug`).
//! Output goes to stderr, or to a daily-rotated `showroom.log` under `SHOWROOM_LOG_DIR`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const ENV_LOG_DIR: &str = "SHOWROOM_LOG_DIR";

fn filter(verbose: bool) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        match "showroom=debug".parse() {
            Ok(directive) => base.add_directive(directive),
            Err(_) => base,
        }
    } else {
        base
    }
}

/// Installs the global subscriber. Keep the returned guard alive until exit so the file
/// writer flushes.
pub fn init(verbose: bool) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let log_dir = std::env::var_os(ENV_LOG_DIR).filter(|d| !d.is_empty());
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(dir, "showroom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(filter(verbose)),
                )
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(filter(verbose)),
                )
                .try_init()?;
            Ok(None)
        }
    }
}
