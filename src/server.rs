//! HTTP surface.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | static index page |
//! | `POST /upload` | multipart `file`, `foldername`, `description` → [`Uploader`] |
//! | `GET /gallery` | reconcile + [`gallery::list`] |
//! | `GET /thumbnail/{name}` | JPEG preview bytes |
//! | anything else | `404 {"error": "Resource not found"}` |
//!
//! Every error leaves as JSON `{"error": "..."}`. Disk and image work runs on
//! the blocking pool so the async workers stay free. Upload bodies are
//! streamed chunk by chunk into a spool file, never buffered whole.

use crate::config::ServerConfig;
use crate::gallery::{self, GalleryStats};
use crate::imaging::{ImageBackend, RustBackend};
use crate::naming;
use crate::provenance::Provenance;
use crate::reconcile::Reconciler;
use crate::store::MetadataStore;
use crate::upload::{self, StagedFile, UploadError, UploadRequest, Uploader};
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid bind address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors as the client sees them.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("File is too large! Please upload a smaller file.")]
    PayloadTooLarge,
    #[error("{0}")]
    Internal(String),
    /// Listing failure; the body still carries an empty listing.
    #[error("{0}")]
    Gallery(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::PayloadTooLarge => {
                warn!("file too large uploaded");
                (StatusCode::PAYLOAD_TOO_LARGE, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(_) => {
                error!(error = %message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
            ApiError::Gallery(_) => {
                error!(error = %message, "gallery failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": message,
                        "files": [],
                        "stats": GalleryStats::default(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(e.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {e}"))
    }
}

/// Everything a handler needs. Built once at startup.
pub struct AppState<B = RustBackend> {
    pub config: ServerConfig,
    pub store: MetadataStore,
    pub backend: B,
    pub provenance: Provenance,
}

impl<B: ImageBackend> AppState<B> {
    pub fn new(config: ServerConfig, backend: B, provenance: Provenance) -> Self {
        let store = MetadataStore::new(&config.paths.metadata_file);
        Self {
            config,
            store,
            backend,
            provenance,
        }
    }

    fn reconciler(&self) -> Reconciler<'_, B> {
        Reconciler::new(&self.config, &self.store, &self.backend)
    }

    fn uploader(&self) -> Uploader<'_, B> {
        Uploader::new(&self.config, &self.store, &self.backend, &self.provenance)
    }
}

pub type SharedState<B> = Arc<AppState<B>>;

/// Build the router with all routes, the body limit and request tracing.
pub fn router<B: ImageBackend + Send + 'static>(state: SharedState<B>) -> Router {
    let body_limit = match state.config.server.max_upload_bytes {
        0 => DefaultBodyLimit::disable(),
        n => DefaultBodyLimit::max(usize::try_from(n).unwrap_or(usize::MAX)),
    };

    Router::new()
        .route("/", get(index_page::<B>))
        .route("/upload", post(upload_file::<B>))
        .route("/gallery", get(list_gallery::<B>))
        .route("/thumbnail/{name}", get(serve_thumbnail::<B>))
        .fallback(not_found)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl+C / SIGTERM, then drain.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|source| ServerError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;

    std::fs::create_dir_all(&config.paths.upload_root)?;
    std::fs::create_dir_all(&config.paths.thumbnail_dir)?;

    let provenance = tokio::task::spawn_blocking(Provenance::detect)
        .await
        .unwrap_or_else(|_| Provenance::unknown());
    info!(
        system = %provenance.uploaded_by,
        ip = %provenance.system_ip,
        uploads = %config.paths.upload_root.display(),
        thumbnails = %config.paths.thumbnail_dir.display(),
        "starting file drop server"
    );

    let state = Arc::new(AppState::new(config, RustBackend::new(), provenance));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - The upload page.
async fn index_page<B: ImageBackend + Send + 'static>(
    State(state): State<SharedState<B>>,
) -> Result<Html<String>, ApiError> {
    match tokio::fs::read_to_string(&state.config.paths.index_page).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!(path = %state.config.paths.index_page.display(), "index page not found");
            Err(ApiError::NotFound(
                "Page not found. Please ensure index.html exists.".into(),
            ))
        }
        Err(e) => Err(ApiError::Internal(format!("Could not load page: {e}"))),
    }
}

/// POST /upload - Store one file.
async fn upload_file<B: ImageBackend + Send + 'static>(
    State(state): State<SharedState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let request = read_upload_form(&state.config, multipart?).await?;

    let receipt =
        tokio::task::spawn_blocking(move || state.uploader().upload(request)).await??;

    Ok(Json(receipt.response()).into_response())
}

/// Collect the known form fields. The file part is spooled to disk; unknown
/// fields are drained and ignored.
async fn read_upload_form(
    config: &ServerConfig,
    mut multipart: Multipart,
) -> Result<UploadRequest, ApiError> {
    let mut request = UploadRequest::default();
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let contents = spool_field(config.paths.upload_root.clone(), &mut field).await?;
                request.file = Some(StagedFile { filename, contents });
            }
            "foldername" => request.folder = field.text().await?,
            "description" => request.description = field.text().await?,
            _ => {
                while field.chunk().await?.is_some() {}
            }
        }
    }
    Ok(request)
}

/// Stream one multipart field into a fresh spool file.
async fn spool_field(
    upload_root: PathBuf,
    field: &mut Field<'_>,
) -> Result<NamedTempFile, ApiError> {
    let contents = tokio::task::spawn_blocking(move || upload::stage(&upload_root))
        .await?
        .map_err(spool_error)?;
    let handle = contents.as_file().try_clone().map_err(spool_error)?;
    let mut out = tokio::fs::File::from_std(handle);

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        out.write_all(&chunk).await.map_err(spool_error)?;
    }
    out.flush().await.map_err(spool_error)?;
    out.sync_all().await.map_err(spool_error)?;
    debug!(bytes = written, "upload spooled");
    Ok(contents)
}

fn spool_error(e: io::Error) -> ApiError {
    ApiError::Internal(format!("Upload failed: {e}"))
}

/// GET /gallery - Reconcile and list everything.
async fn list_gallery<B: ImageBackend + Send + 'static>(
    State(state): State<SharedState<B>>,
) -> Result<Json<gallery::GalleryListing>, ApiError> {
    tokio::task::spawn_blocking(move || gallery::list(&state.reconciler()))
        .await
        .map(Json)
        .map_err(|e| ApiError::Gallery(e.to_string()))
}

/// GET /thumbnail/{name} - Preview bytes, always JPEG.
async fn serve_thumbnail<B: ImageBackend + Send + 'static>(
    State(state): State<SharedState<B>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if !naming::is_safe_thumbnail_name(&name) {
        warn!(name = %name, "rejected thumbnail name");
        return Err(not_found_error());
    }

    let path = state.config.paths.thumbnail_dir.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()),
        Err(e) => {
            warn!(name = %name, error = %e, "thumbnail not found");
            Err(not_found_error())
        }
    }
}

async fn not_found() -> ApiError {
    not_found_error()
}

fn not_found_error() -> ApiError {
    ApiError::NotFound("Resource not found".into())
}
