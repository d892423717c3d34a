use anyhow::{bail, Context, Result};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::config_model::AppConfig;

static CONFIG_CACHE: OnceLock<AppConfig> = OnceLock::new();

pub const DEFAULT_CONFIG_PATH: &str = "comtrade.json";

/// Reads the JSON config file; a missing file yields defaults.
pub async fn load_config(file_path: &str) -> Result<AppConfig> {
    match fs::read_to_string(file_path).await {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("JSON parse error in {file_path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(e).with_context(|| format!("file read error: {file_path}")),
    }
}

/// Applies `SERVER_PORT`, `STORAGE_LOCAL_PATH`, `CACHE_CAPACITY` and `AUTH_TOKEN`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(path) = lookup("STORAGE_LOCAL_PATH").filter(|p| !p.is_empty()) {
        config.storage.base_path = path;
    }
    if let Some(capacity) = lookup("CACHE_CAPACITY").and_then(|c| c.parse().ok()) {
        config.cache.capacity = capacity;
    }
    if let Some(token) = lookup("AUTH_TOKEN").filter(|t| !t.is_empty()) {
        config.auth.token = Some(token);
    }
}

pub fn validate(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        bail!("invalid server port: 0");
    }
    if config.storage.base_path.trim().is_empty() {
        bail!("storage base_path is required");
    }
    if config.cache.capacity == 0 {
        bail!("cache capacity must be at least 1");
    }
    Ok(())
}

pub async fn init_config_and_bind() -> Result<(&'static AppConfig, TcpListener)> {
    let file_path =
        std::env::var("COMTRADE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = load_config(&file_path).await?;
    apply_env_overrides(&mut config, |k| std::env::var(k).ok());
    validate(&config)?;

    let bind_addr = format!("{}:{}", config.server.ip, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind failed: {bind_addr}"))?;

    let config = CONFIG_CACHE.get_or_init(|| config);
    info!("Config initialized from {}", file_path);

    Ok((config, listener))
}

pub fn get_cached_config() -> &'static AppConfig {
    CONFIG_CACHE.get_or_init(AppConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SERVER_PORT", "9000"),
            ("STORAGE_LOCAL_PATH", "/srv/comtrade"),
            ("CACHE_CAPACITY", "not-a-number"),
            ("AUTH_TOKEN", "s3cret"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.base_path, "/srv/comtrade");
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.auth.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "cache": { "capacity": 3 }, "auth": { "token": "t" } }"#).unwrap();
        assert_eq!(config.cache.capacity, 3);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.waveform.default_target_points, 5000);
        assert!(validate(&config).is_ok());

        let json = serde_json::to_value(&config).unwrap();
        assert!(json["auth"].get("token").is_none());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.cache.capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let config = load_config("/nonexistent/comtrade.json").await.unwrap();
        assert_eq!(config.storage.base_path, "./data");
    }
}
