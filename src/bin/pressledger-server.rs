#![forbid(unsafe_code)]
//! HTTP API server for PressLedger

use pressledger::api::{run_api_server, AppState};
use pressledger::blockchain::Ledger;
use pressledger::config::load_config;
use pressledger::resolver::Resolver;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;
    let ledger = Ledger::open(&config.ledger.path, config.ledger.difficulty)?;
    info!(
        path = %config.ledger.path,
        blocks = ledger.len(),
        difficulty = config.ledger.difficulty,
        "ledger ready"
    );

    let ledger = ledger.into_shared();
    let resolver = Resolver::from_config(ledger.clone(), &config)?;
    let state = Arc::new(AppState::new(ledger, resolver));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.api.port);

    run_api_server(state, port).await?;
    Ok(())
}
