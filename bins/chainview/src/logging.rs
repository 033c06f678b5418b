use std::fs::File;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Sends every log line to `path`, truncated on start. The terminal belongs
/// to the grid, so nothing is logged to stdout or stderr.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init(path: &str, level: &str) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("cannot open log file '{path}'"))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("bad log level '{level}'"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install log subscriber: {e}"))?;
    Ok(())
}
