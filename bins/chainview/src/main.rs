mod logging;
mod net;
mod prompt;
mod terminal;

use std::io;
use std::sync::Arc;

use anyhow::Context;
use chain_config::ChainConfig;
use chain_core::DisplayGrid;
use chain_engine::{ChainEngine, Gateway, Session, WorkerPool};
use chain_sim::SimGateway;

use crate::terminal::Terminal;

const DEFAULT_CONFIG: &str = "chainview.toml";

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = ChainConfig::load_or_default(config_path.as_str())
        .with_context(|| format!("cannot load config '{config_path}'"))?;
    logging::init(&config.log_file, &config.log_level)?;
    tracing::info!(config = %config_path, "starting chainview");

    let (symbol, expiry) = {
        let mut input = io::stdin().lock();
        let mut out = io::stdout();
        let symbol = prompt::choose_symbol(&config, &mut input, &mut out)?;
        let expiry = prompt::choose_expiry(&config, &mut input, &mut out)?;
        (symbol, expiry)
    };
    let host = match &config.host {
        Some(host) => host.clone(),
        None => net::default_gateway()?.to_string(),
    };
    tracing::info!(%symbol, %expiry, %host, port = config.port, "session selected");

    let session = Session {
        symbol,
        expiry,
        exchange: config.exchange.clone(),
        currency: config.currency.clone(),
        market_data_type: config.market_data_type,
    };

    let terminal = Terminal::enter().context("cannot set up terminal")?;
    terminal.show_loading()?;

    let gateway = Arc::new(SimGateway::new(config.sim.clone()));
    let grid = Arc::new(DisplayGrid::new(Box::new(terminal.surface())));
    let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
    let engine = Arc::new(ChainEngine::new(session, dyn_gateway, grid));

    let connection = engine.connect(&host, config.port, config.client_id)?;
    let center = engine.bootstrap()?;
    tracing::info!(center = %center, "chain ready");

    let pool = WorkerPool::spawn(WorkerPool::default_size(), gateway.events(), engine.clone())
        .context("cannot start worker pool")?;
    let subscribed = engine.subscribe_visible()?;
    tracing::info!(subscribed, workers = pool.size(), "streaming");

    terminal.show_footer()?;
    terminal.wait_for_quit()?;
    tracing::info!("quit requested");

    pool.shutdown();
    drop(connection);
    drop(terminal);
    tracing::info!("bye");
    Ok(())
}
