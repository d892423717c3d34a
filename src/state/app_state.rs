use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use comtrade_reader::{parse_comtrade, Dataset, DatasetCache};

use crate::models::config_model::AppConfig;
use crate::models::dataset_model::ApiError;
use crate::storage::{read_by_suffix, Storage, StorageError};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DatasetCache>,
    pub storage: Arc<dyn Storage>,
    pub config: &'static AppConfig,
}

impl AppState {
    pub fn new(config: &'static AppConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            cache: Arc::new(DatasetCache::new(config.cache.capacity)),
            storage,
            config,
        }
    }

    /// Cached dataset, parsing it from storage on a miss.
    ///
    /// Concurrent misses for the same id each parse; the last `set` wins.
    pub async fn load_dataset(&self, id: &str) -> Result<Arc<Dataset>, ApiError> {
        check_dataset_id(id)?;
        if let Some(dataset) = self.cache.get(id) {
            debug!("Cache hit for dataset {}", id);
            return Ok(dataset);
        }
        debug!("Cache miss for dataset {}, parsing from storage", id);

        let state = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Arc<Dataset>, ApiError> {
            let started = Instant::now();
            let storage = state.storage.as_ref();
            let cfg = read_by_suffix(storage, &id, ".cfg").map_err(not_found(&id))?;
            let dat = read_by_suffix(storage, &id, ".dat").map_err(not_found(&id))?;
            let (meta, data) = parse_comtrade(&cfg, &dat)?;
            debug!("Parsed dataset {} in {:?}", id, started.elapsed());
            Ok(state.cache.set(&id, meta, data))
        })
        .await
        .map_err(ApiError::internal)?
    }
}

fn dataset_not_found(id: &str) -> ApiError {
    ApiError::new(
        axum::http::StatusCode::NOT_FOUND,
        "DATASET_NOT_FOUND",
        format!("dataset {id} not found"),
    )
}

/// Dataset ids are the 32-digit simple uuids handed out on import.
pub fn check_dataset_id(id: &str) -> Result<(), ApiError> {
    if id.len() == 32 && uuid::Uuid::try_parse(id).is_ok() {
        Ok(())
    } else {
        Err(dataset_not_found(id))
    }
}

pub fn not_found(id: &str) -> impl Fn(StorageError) -> ApiError + '_ {
    move |e| match e {
        StorageError::NotFound { .. } | StorageError::InvalidPath(_) => dataset_not_found(id)
            .with_details(serde_json::json!({ "detail": e.to_string() })),
        other => ApiError::internal(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_id_must_be_simple_uuid() {
        let id = uuid::Uuid::new_v4().simple().to_string();
        assert!(check_dataset_id(&id).is_ok());

        let hyphenated = uuid::Uuid::new_v4().to_string();
        for bad in [".", "..", "", "ghost", "a/b", hyphenated.as_str()] {
            let err = check_dataset_id(bad).unwrap_err();
            assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
            assert_eq!(err.code, "DATASET_NOT_FOUND");
        }
    }
}
