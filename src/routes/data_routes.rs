use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use tracing::{error, info};

use comtrade_reader::{
    build_canvas, build_waveforms, parse_complete_metadata, parse_metadata, Metadata, Stage,
    WaveformQuery,
};

use crate::models::dataset_model::{ApiError, DatasetInfo, DatasetManifest, ImportResponse};
use crate::routes::auth::require_token;
use crate::state::app_state::{check_dataset_id, not_found, AppState};
use crate::storage::{find_by_suffix, read_by_suffix, Storage, StorageResult};

type Annotation = Map<String, Value>;

const MANIFEST_FILE: &str = "dataset.json";
const ANNOTATIONS_FILE: &str = "annotations.json";

/// =======================
/// ROUTER
/// =======================

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/import", post(import_dataset))
        .route("/api/datasets/{id}", delete(delete_dataset))
        .route("/api/datasets/{id}/metadata", get(dataset_metadata))
        .route("/api/datasets/{id}/waveforms", get(waveforms))
        .route("/api/datasets/{id}/wavecanvas", get(wavecanvas))
        .route(
            "/api/datasets/{id}/annotations",
            get(list_annotations).post(add_annotation),
        )
        .route(
            "/api/datasets/{id}/annotations/{ann_id}",
            delete(delete_annotation),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .with_state(state)
}

/// Runs storage access or parsing on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|e| e.trim().starts_with("gzip")))
}

/// Serialises `value`, gzip-compressing it when `level` is set.
fn json_body<T: Serialize>(value: &T, level: Option<Compression>) -> Result<Response, ApiError> {
    let bytes = serde_json::to_vec(value).map_err(ApiError::internal)?;
    let mut response = match level {
        Some(level) => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 4), level);
            encoder.write_all(&bytes).map_err(ApiError::internal)?;
            let compressed = encoder.finish().map_err(ApiError::internal)?;
            let mut response = Response::new(Body::from(compressed));
            response
                .headers_mut()
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            response
        }
        None => Response::new(Body::from(bytes)),
    };
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    Ok(response)
}

fn has_extension(file_name: &str, ext: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn bad_request(code: &'static str, message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, code, message)
}

/// Groups stored files by their top-level directory, newest first.
pub fn collect_datasets(storage: &dyn Storage) -> StorageResult<Vec<DatasetInfo>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in storage.list("")? {
        if let Some((id, _)) = path.split_once('/') {
            groups.entry(id.to_string()).or_default().push(path);
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (id, files) in groups {
        let mut size_bytes = 0;
        for f in &files {
            size_bytes += storage.size(f)?;
        }
        let manifest = storage
            .read(&format!("{id}/{MANIFEST_FILE}"))
            .ok()
            .and_then(|b| serde_json::from_slice::<DatasetManifest>(&b).ok());
        let (name, created_at) = match manifest {
            Some(m) => (m.name, m.created_at),
            None => (id.clone(), 0),
        };
        out.push(DatasetInfo {
            dataset_id: id,
            name,
            created_at,
            size_bytes,
        });
    }
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.dataset_id.cmp(&b.dataset_id)));
    Ok(out)
}

/// 404 unless `id` names an imported dataset.
fn require_dataset(storage: &dyn Storage, id: &str) -> Result<(), ApiError> {
    check_dataset_id(id)?;
    find_by_suffix(storage, id, ".cfg")
        .map(|_| ())
        .map_err(not_found(id))
}

fn read_annotations(storage: &dyn Storage, id: &str) -> Result<Vec<Annotation>, ApiError> {
    let path = format!("{id}/{ANNOTATIONS_FILE}");
    if !storage.exists(&path).map_err(not_found(id))? {
        return Ok(Vec::new());
    }
    let data = storage.read(&path).map_err(ApiError::internal)?;
    serde_json::from_slice(&data).map_err(|e| {
        error!("annotations of {} are unreadable: {}", id, e);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ANNOTATIONS_CORRUPT",
            "stored annotations could not be read",
        )
        .with_details(json!({ "detail": e.to_string() }))
    })
}

fn write_annotations(storage: &dyn Storage, id: &str, annotations: &[Annotation]) -> Result<(), ApiError> {
    let body = serde_json::to_vec_pretty(annotations).map_err(ApiError::internal)?;
    storage
        .save(&format!("{id}/{ANNOTATIONS_FILE}"), &body)
        .map_err(ApiError::internal)
}

/// =======================
/// HANDLERS
/// =======================

async fn list_datasets(State(state): State<AppState>) -> Result<Json<Vec<DatasetInfo>>, ApiError> {
    let storage = state.storage.clone();
    let datasets = blocking(move || collect_datasets(storage.as_ref()).map_err(ApiError::internal)).await?;
    Ok(Json(datasets))
}

async fn import_dataset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let invalid_form = |e: axum::extract::multipart::MultipartError| {
        bad_request("INVALID_FORM", "invalid multipart form")
            .with_details(json!({ "detail": e.to_string() }))
    };

    let mut files: HashMap<String, (String, Bytes)> = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        if field_name != "cfg" && field_name != "dat" {
            continue;
        }
        let file_name = field
            .file_name()
            .and_then(|n| std::path::Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = field.bytes().await.map_err(invalid_form)?;
        files.insert(field_name, (file_name, bytes));
    }

    let (cfg_name, cfg) = files
        .remove("cfg")
        .ok_or_else(|| bad_request("CFG_MISSING", ".cfg file missing"))?;
    let (dat_name, dat) = files
        .remove("dat")
        .ok_or_else(|| bad_request("DAT_MISSING", ".dat file missing"))?;
    if !has_extension(&cfg_name, "cfg") {
        return Err(bad_request("CFG_EXT_INVALID", "configuration file must end in .cfg")
            .with_details(json!({ "expected": ".cfg" })));
    }
    if !has_extension(&dat_name, "dat") {
        return Err(bad_request("DAT_EXT_INVALID", "data file must end in .dat")
            .with_details(json!({ "expected": ".dat" })));
    }

    let dataset_id = uuid::Uuid::new_v4().simple().to_string();
    let name = std::path::Path::new(&cfg_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(dataset_id.as_str())
        .to_string();
    let manifest = DatasetManifest {
        name: name.clone(),
        created_at: chrono::Utc::now().timestamp_millis(),
    };

    let storage = state.storage.clone();
    let id = dataset_id.clone();
    blocking(move || {
        parse_complete_metadata(&cfg).map_err(|e| {
            let mut err = ApiError::from(e.in_stage(Stage::Cfg));
            err.status = StatusCode::BAD_REQUEST;
            err
        })?;
        let manifest = serde_json::to_vec(&manifest).map_err(ApiError::internal)?;
        storage
            .save(&format!("{id}/{cfg_name}"), &cfg)
            .and_then(|_| storage.save(&format!("{id}/{dat_name}"), &dat))
            .and_then(|_| storage.save(&format!("{id}/{MANIFEST_FILE}"), &manifest))
            .map_err(ApiError::internal)
    })
    .await?;

    info!("Imported dataset {} ({})", dataset_id, name);
    Ok(Json(ImportResponse { dataset_id, name }))
}

async fn delete_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_dataset_id(&id)?;
    let storage = state.storage.clone();
    let target = id.clone();
    let removed = blocking(move || {
        let files = storage.list(&target).map_err(not_found(&target))?;
        for f in &files {
            storage.delete(f).map_err(ApiError::internal)?;
        }
        Ok(files.len())
    })
    .await?;
    if removed == 0 {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", format!("dataset {id} not found")));
    }

    state.cache.remove(&id);
    info!("Deleted dataset {} ({} files)", id, removed);
    Ok(Json(json!({ "ok": true })))
}

async fn dataset_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Metadata>, ApiError> {
    check_dataset_id(&id)?;
    if let Some(dataset) = state.cache.get(&id) {
        return Ok(Json(dataset.metadata.clone()));
    }
    let storage = state.storage.clone();
    let meta = blocking(move || {
        let cfg = read_by_suffix(storage.as_ref(), &id, ".cfg").map_err(not_found(&id))?;
        Ok(parse_metadata(&cfg)?)
    })
    .await?;
    Ok(Json(meta))
}

async fn waveforms(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WaveformQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let dataset = state.load_dataset(&id).await.inspect_err(|e| {
        error!("waveforms for {} failed: {}", id, e.code);
    })?;
    let target = state.config.waveform.default_target_points;
    let level = accepts_gzip(&headers).then(Compression::best);

    blocking(move || {
        let response = build_waveforms(&dataset, &query, target)?;
        json_body(&response, level)
    })
    .await
}

async fn wavecanvas(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let dataset = state.load_dataset(&id).await.inspect_err(|e| {
        error!("wavecanvas for {} failed: {}", id, e.code);
    })?;
    let level = accepts_gzip(&headers).then(Compression::fast);

    blocking(move || json_body(&build_canvas(&dataset), level)).await
}

async fn list_annotations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Annotation>>, ApiError> {
    let storage = state.storage.clone();
    let annotations = blocking(move || {
        require_dataset(storage.as_ref(), &id)?;
        read_annotations(storage.as_ref(), &id)
    })
    .await?;
    Ok(Json(annotations))
}

async fn add_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut annotation): Json<Annotation>,
) -> Result<Json<Value>, ApiError> {
    let ann_id = uuid::Uuid::new_v4().simple().to_string();
    annotation.insert("id".to_string(), Value::String(ann_id.clone()));

    let storage = state.storage.clone();
    blocking(move || {
        let storage = storage.as_ref();
        require_dataset(storage, &id)?;
        let mut annotations = read_annotations(storage, &id)?;
        annotations.push(annotation);
        write_annotations(storage, &id, &annotations)
    })
    .await?;

    Ok(Json(json!({ "id": ann_id })))
}

async fn delete_annotation(
    State(state): State<AppState>,
    Path((id, ann_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.clone();
    blocking(move || {
        let storage = storage.as_ref();
        require_dataset(storage, &id)?;
        let mut annotations = read_annotations(storage, &id)?;
        annotations.retain(|a| a.get("id").and_then(Value::as_str) != Some(ann_id.as_str()));
        write_annotations(storage, &id, &annotations)
    })
    .await?;

    Ok(Json(json!({ "ok": true })))
}
