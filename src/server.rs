//! HTTP service: `GET /` and `GET /health` status, `POST /predict` image
//! classification and `POST /forensics` descriptive image statistics.
//!
//! The router is built from an explicit [`ServerConfig`]; nothing is read from
//! globals. Layers, outermost first: request tracing, CORS, rate limit (when
//! enabled), body limit.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, SERVICE_NAME};
use crate::forensics::{self, ForensicReport};
use crate::rate::{self, RateLimiter};
use crate::verdict::{self, Prediction};

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Request failures and their HTTP mapping.
///
/// Validation errors carry a specific client message. Processing errors are
/// logged with full detail and reported only as `internal server error`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No multipart file part named `file`.
    #[error("No file part")]
    NoFilePart,
    /// The `file` part has an empty filename.
    #[error("No selected file")]
    NoSelectedFile,
    /// The filename extension is not an allowed image type.
    #[error("Unsupported file extension")]
    UnsupportedExtension,
    /// The request body exceeded the upload cap.
    #[error("File too large")]
    PayloadTooLarge,
    /// The client exceeded the configured request rate.
    #[error("Too many requests")]
    RateLimited {
        /// Seconds until the client may retry.
        retry_after: u64,
    },
    /// Decoding or scoring the upload failed.
    #[error("processing failed: {0}")]
    Processing(#[from] crate::Error),
    /// Any other server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn from_multipart(err: &MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            tracing::warn!(error = %err, "malformed multipart body");
            ApiError::NoFilePart
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::NoFilePart => (StatusCode::BAD_REQUEST, "No file part"),
            ApiError::NoSelectedFile => (StatusCode::BAD_REQUEST, "No selected file"),
            ApiError::UnsupportedExtension => {
                (StatusCode::BAD_REQUEST, "Unsupported file extension")
            }
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "File too large"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
            ApiError::Processing(_) | ApiError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        let mut response = (status, Json(ErrorResponse { error })).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, val);
            }
        }
        response
    }
}

/// Build the service router.
#[must_use]
pub fn router(config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/forensics", post(forensics))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    if config.rate_limit_max > 0 {
        let limiter = Arc::new(Mutex::new(RateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window,
        )));
        app = app.layer(axum::middleware::from_fn_with_state(limiter, rate::limit));
    }

    app.layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS restricted to the configured origins. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind the configured address and serve until Ctrl-C.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the listener cannot be bound or the server
/// fails while running.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        addr = %addr,
        origins = ?config.allowed_origins,
        max_upload_bytes = config.max_upload_bytes,
        rate_limit_max = config.rate_limit_max,
        "{SERVICE_NAME} backend listening"
    );

    axum::serve(
        listener,
        router(&config).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: format!("{SERVICE_NAME} backend"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn predict(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let size = bytes.len();
    let prediction = tokio::task::spawn_blocking(move || verdict::predict(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("scoring task failed: {e}")))??;

    tracing::info!(
        filename = %filename,
        size,
        result = %prediction.label,
        raw_score = prediction.raw_score,
        "image classified"
    );

    Ok(Json(prediction))
}

async fn forensics(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ForensicReport>, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let report = tokio::task::spawn_blocking(move || forensics::analyze_bytes(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("forensics task failed: {e}")))??;

    tracing::info!(
        filename = %filename,
        size = report.size_bytes,
        exif_fields = report.exif_fields,
        noise_std = report.noise_std,
        "forensic report built"
    );

    Ok(Json(report))
}

/// Read the upload and apply the filename checks shared by every upload route.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, Vec<u8>), ApiError> {
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::NoFilePart);
    };

    let (filename, bytes) = read_file_part(&mut multipart).await?;
    if filename.is_empty() {
        return Err(ApiError::NoSelectedFile);
    }
    if !verdict::is_allowed_filename(&filename) {
        return Err(ApiError::UnsupportedExtension);
    }
    Ok((filename, bytes))
}

/// Find the `file` part and read it fully.
///
/// A `file` part without a `filename` parameter is a plain form field and
/// does not count.
async fn read_file_part(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::NoFilePart),
            Err(e) => return Err(ApiError::from_multipart(&e)),
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::from_multipart(&e))?;
        return Ok((filename, bytes.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        for err in [
            ApiError::NoFilePart,
            ApiError::NoSelectedFile,
            ApiError::UnsupportedExtension,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn processing_errors_map_to_internal_error() {
        let err = ApiError::Processing(crate::Error::EmptyImage {
            width: 0,
            height: 0,
        });
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn oversized_upload_maps_to_413() {
        assert_eq!(
            ApiError::PayloadTooLarge.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn invalid_origins_are_skipped() {
        // must not panic on a value that is not a valid header
        let _layer = cors_layer(&["http://ok.example".to_string(), "bad\norigin".to_string()]);
    }
}
