use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tracing::{info, Level};

mod models;
mod routes;
mod state;
mod storage;
mod utils;

use crate::state::app_state::AppState;
use crate::storage::LocalStorage;
use crate::utils::conf_helper::init_config_and_bind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // === CONFIG + LISTENER ===
    let (config, listener) = init_config_and_bind().await?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level.parse::<Level>().unwrap_or(Level::INFO))
        .init();

    let storage = LocalStorage::new(&config.storage.base_path)
        .with_context(|| format!("cannot open storage at {}", config.storage.base_path))?;
    let state = AppState::new(config, Arc::new(storage));

    info!(
        "Server initialized on {}:{} (storage: {}, cache capacity: {}, auth: {})",
        config.server.ip,
        config.server.port,
        config.storage.base_path,
        config.cache.capacity,
        if config.auth.token.is_some() { "token" } else { "off" }
    );

    let app = Router::new()
        .merge(routes::info_routes::health_routes())
        .merge(routes::data_routes::data_routes(state));

    axum::serve(listener, app).await?;
    Ok(())
}
