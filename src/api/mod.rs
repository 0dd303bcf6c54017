//! HTTP API server.
//!
//! JSON endpoints under `/api` drive the [`Supervisor`]; everything else is
//! served from the public directory (rendered QR codes and the web UI).

mod assets;
mod upload;


use crate::supervisor::{SessionInfo, Supervisor};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use hive_core::{config::ApiConfig, error::HiveError, message::OutgoingImage};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    supervisor: Supervisor,
    api_key: Option<String>,
    max_image_bytes: usize,
    uploads_dir: Arc<PathBuf>,
    public_dir: Arc<PathBuf>,
}

impl ApiState {
    pub fn new(
        supervisor: Supervisor,
        api_key: &str,
        max_image_bytes: usize,
        uploads_dir: PathBuf,
        public_dir: PathBuf,
    ) -> Self {
        Self {
            supervisor,
            api_key: if api_key.is_empty() {
                None
            } else {
                Some(api_key.to_string())
            },
            max_image_bytes,
            uploads_dir: Arc::new(uploads_dir),
            public_dir: Arc::new(public_dir),
        }
    }
}

/// `POST /api/sessions` request body.
#[derive(Debug, Default, Deserialize)]
struct CreateRequest {
    id: Option<String>,
}

/// `POST /api/sessions/{id}/send-message` request body.
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    number: String,
    message: String,
}

/// Constant-time string comparison to prevent timing attacks on API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured.
    };

    let header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// Map a domain error to its HTTP status and JSON body.
fn error_response(e: HiveError) -> ApiError {
    let status = match &e {
        HiveError::NotFound(_) => StatusCode::NOT_FOUND,
        HiveError::AlreadyExists(_)
        | HiveError::NotConnected(_)
        | HiveError::InvalidUpload(_)
        | HiveError::InvalidSessionId(_)
        | HiveError::InvalidDestination(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {e}");
    }
    (status, Json(json!({"error": e.to_string()})))
}

fn bad_request(msg: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

/// Decode a JSON body, answering malformed input with a JSON 400.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid request body: {e}")))
}

/// `GET /api/sessions`: Every session with its status.
async fn list_sessions(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Vec<SessionInfo>>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    Ok(Json(state.supervisor.list_sessions()))
}

/// `POST /api/sessions`: Create a session; the body and its `id` are optional.
async fn create_session(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<SessionInfo>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let request: CreateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateRequest::default()
    } else {
        parse_body(&body)?
    };

    let info = state
        .supervisor
        .create_session(request.id)
        .map_err(error_response)?;
    Ok(Json(info))
}

/// `GET /api/sessions/{id}/status`: Status plus QR reference while pairing.
async fn session_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let view = state.supervisor.status(&id).map_err(error_response)?;
    Ok(Json(json!({
        "status": view.status,
        "qr": view.qr,
    })))
}

/// `POST /api/sessions/{id}/send-message`: Send a text message.
async fn send_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let request: SendMessageRequest = parse_body(&body)?;

    state
        .supervisor
        .send_text(&id, &request.number, &request.message)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({"success": true})))
}

/// `POST /api/sessions/{id}/send-image`: Multipart image send.
///
/// The upload is validated before the session is consulted and the saved
/// file is removed once the send attempt finishes.
async fn send_image(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let multipart =
        multipart.map_err(|e| bad_request(format!("expected a multipart form: {}", e.body_text())))?;

    let form = upload::read_form(multipart, state.max_image_bytes)
        .await
        .map_err(error_response)?;
    let path = upload::save(&state.uploads_dir, &form.image)
        .await
        .map_err(error_response)?;

    let image = OutgoingImage {
        path: path.clone(),
        mime_type: form.image.mime_type.clone(),
        caption: form.caption,
    };
    let result = state.supervisor.send_image(&id, &form.number, &image).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("failed to remove upload {}: {e}", path.display());
    }

    result.map_err(error_response)?;
    Ok(Json(json!({"success": true})))
}

/// `DELETE /api/sessions/{id}`: Close a session. Idempotent.
async fn close_session(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if state.supervisor.close_session(&id).await {
        info!("session {id}: closed via API");
    }
    Ok(Json(json!({"success": true})))
}

/// Build the axum router with all routes.
pub fn build_router(state: ApiState) -> Router {
    // Room for the multipart envelope around a maximum-size image.
    let body_limit = state.max_image_bytes.saturating_mul(2);

    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/{id}",
            axum::routing::delete(close_session),
        )
        .route("/api/sessions/{id}/status", get(session_status))
        .route("/api/sessions/{id}/send-message", post(send_message))
        .route("/api/sessions/{id}/send-image", post(send_image))
        .fallback(assets::serve)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    config: &ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    if state.api_key.is_none() {
        warn!("API running without authentication (api_key is empty)");
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind API server to {addr}: {e}"))?;

    info!("API server listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("API server stopped");
    Ok(())
}
