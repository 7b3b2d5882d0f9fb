use std::sync::Arc;

use calendar_mcp_http::{
    config::Config, dispatcher::UnconfiguredDispatcher, logging, serve, AppState,
};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    warn!("no tool registry configured; tool endpoints will report missing capabilities");

    let state = AppState::new(&config, Arc::new(UnconfiguredDispatcher::new()));
    serve(&config, state).await?;
    Ok(())
}
