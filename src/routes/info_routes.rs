use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::debug;

pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(info_check))
}

#[derive(Serialize)]
pub struct HealthStatus {
    status: String,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    name: String,
    version: &'static str,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_owned(),
    })
}

async fn info_check() -> Json<ServiceInfo> {
    let config = crate::utils::conf_helper::get_cached_config();
    debug!("{} info requested", config.name);
    Json(ServiceInfo {
        name: config.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
