//! Quickstat HTTP server
//!
//! Thin axum surface around the summarizer. Every response carries
//! permissive CORS headers since the browser client is served from a
//! different origin.
//!
//! | Route                          | Purpose                                     |
//! |--------------------------------|---------------------------------------------|
//! | `POST /api/upload`             | Store a CSV, return summary + chart sample  |
//! | `OPTIONS /api/upload`          | CORS preflight, empty 200 (CORS layer)      |
//! | `GET /api/sample/{*filename}`  | Download a stored upload as an attachment   |
//! | `GET /health`                  | Readiness probe                             |
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  multipart  ┌──────────────┐ spawn_blocking ┌─────────────┐
//! │   Browser    │────────────▶│ Axum Router  │───────────────▶│ store+parse │
//! │   client     │◀────────────│   (async)    │◀───────────────│ +summarize  │
//! └──────────────┘    JSON     └──────────────┘                └─────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        DefaultBodyLimit, Path, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::format::{parse_csv, ParseError};
use crate::sample::{sample, Sample, DEFAULT_SAMPLE_LIMIT};
use crate::storage::{content_type, sanitize_filename, UploadStore};
use crate::summary::{summarize, Summary};

/// Multipart field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

// ─── Configuration ──────────────────────────────────────────────────────────

/// Startup configuration, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub sample_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 64 * 1024 * 1024,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Request failures, each rendered as `{"error": .., "detail": ..}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no file part")]
    NoFilePart,
    #[error("no filename")]
    NoFilename,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("failed to read upload")]
    Upload { status: StatusCode, detail: String },
    #[error("failed to read CSV")]
    ParseFailed(#[from] ParseError),
    #[error("failed to store file")]
    Storage(String),
    #[error("not found")]
    NotFound,
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFilePart
            | ApiError::NoFilename
            | ApiError::InvalidFilename
            | ApiError::ParseFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload { status, .. } => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::ParseFailed(e) => Some(e.to_string()),
            ApiError::Upload { detail, .. }
            | ApiError::Storage(detail)
            | ApiError::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    fn from_multipart(err: MultipartError) -> Self {
        ApiError::Upload {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("{}: {:?}", self, self.detail());
        } else {
            debug!("Rejected request: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

// ─── Shared state ───────────────────────────────────────────────────────────

/// Immutable per-process state handed to every handler
pub struct AppState {
    pub store: UploadStore,
    pub sample_limit: usize,
}

pub type SharedState = Arc<AppState>;

/// Successful upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub summary: Summary,
    pub sample: Sample,
}

// ─── Server bootstrap ───────────────────────────────────────────────────────

/// Build the router with CORS, request tracing and the upload size limit.
///
/// The CORS layer answers every `OPTIONS` request itself with an empty 200.
pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/sample/{*filename}", get(download))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::map_response(allow_cors_everywhere))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the upload directory and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let store = UploadStore::open(&config.upload_dir)?;
    info!("Upload directory: {}", store.root().display());

    let state: SharedState = Arc::new(AppState {
        store,
        sample_limit: config.sample_limit,
    });
    let app = router(state, config.max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("quickstat listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("quickstat stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Plain responses get the same allow lists a preflight would
async fn allow_cors_everywhere(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static(ALLOWED_METHODS));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(HeaderValue::from_static(ALLOWED_HEADERS));
    response
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// Health-check endpoint (useful for readiness probes).
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok", "server": "quickstat"})))
}

/// `POST /api/upload` - store the file, then parse and summarise it.
async fn upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Not a multipart upload: {}", e);
        ApiError::NoFilePart
    })?;

    let (filename, data) = read_file_field(&mut multipart).await?;
    let name = sanitize_filename(&filename).ok_or(ApiError::InvalidFilename)?;
    info!("Upload {} ({} bytes)", name, data.len());

    // Disk write and CPU-bound summarising run off the async workers
    let response = tokio::task::spawn_blocking(move || process_upload(&state, &name, &data))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(response))
}

/// Find the first `file` field that carries a filename
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A `file` field without a filename is a plain form value
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(ApiError::NoFilename);
        }
        let data = field.bytes().await.map_err(ApiError::from_multipart)?;
        return Ok((filename, data));
    }

    Err(ApiError::NoFilePart)
}

fn process_upload(state: &AppState, name: &str, data: &[u8]) -> Result<UploadResponse, ApiError> {
    state
        .store
        .save(name, data)
        .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

    let dataset = parse_csv(data)?;
    let summary = summarize(&dataset);
    let sample = sample(&dataset, state.sample_limit);

    info!(
        "Summarised {}: {} rows, {} columns, {} numeric, {} outlier rows",
        name,
        summary.rows,
        summary.columns,
        summary.numeric_columns.len(),
        summary.outliers.outlier_rows
    );
    Ok(UploadResponse { summary, sample })
}

/// `GET /api/sample/{*filename}` - return a stored upload byte-for-byte.
async fn download(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let lookup = filename.clone();
    let data = tokio::task::spawn_blocking(move || state.store.load(&lookup))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?
        .ok_or(ApiError::NotFound)?;

    debug!("Download {} ({} bytes)", filename, data.len());
    let headers = [
        (header::CONTENT_TYPE, content_type(&filename).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename.replace('"', "")),
        ),
    ];
    Ok((headers, data).into_response())
}
