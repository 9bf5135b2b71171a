//! HTTP surface of the plugin backend.
//!
//! HTML pages go through the sign-in redirect; JSON routes answer 401 instead.
//! `/downloadfile` carries no cookie and authenticates with a correlation key.

use crate::auth::{logout, oauth_callback, require_session, ApiSession};
use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use bridge_cloud::{CloudError, NewDocument, Resolution};
use bridge_email::{extract_mail_item_attributes, EwsSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path as FsPath, PathBuf};
use tokio::net::TcpListener;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub media: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub correlation_backend: &'static str,
}

#[derive(Deserialize)]
pub struct RecordingRequest {
    #[serde(rename = "EwsUrl")]
    pub ews_url: String,
    #[serde(rename = "AuthToken")]
    pub auth_token: String,
    #[serde(rename = "MailId")]
    pub mail_id: String,
}

#[derive(Deserialize)]
pub struct SaveAttachmentRequest {
    #[serde(rename = "AuthToken")]
    pub auth_token: String,
    #[serde(rename = "AttachmentId")]
    pub attachment_id: String,
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "EwsUrl")]
    pub ews_url: String,
    #[serde(rename = "WorkspaceId")]
    pub workspace_id: String,
    #[serde(rename = "ContentType", default)]
    pub content_type: String,
}

async fn prepare_to_attach_file(
    State(state): State<AppState>,
    session: ApiSession,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.tokens.mint(&session.credential).await?;
    Ok(Json(KeyResponse { key }))
}

async fn get_recording_url(
    State(state): State<AppState>,
    session: ApiSession,
    Json(body): Json<RecordingRequest>,
) -> Result<Response, ApiError> {
    let settings = EwsSettings {
        endpoint: body.ews_url,
        access_token: body.auth_token,
    };
    let raw = match state.mail.fetch_item(&settings, &body.mail_id).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "could not fetch mail item for recording lookup");
            return Err(ApiError::RecordingNotFound);
        }
    };

    let attributes = extract_mail_item_attributes(&raw);
    match state.resolver.resolve(&session.credential, &attributes).await {
        Resolution::Found(media) => Ok(Json(MediaResponse { media }).into_response()),
        Resolution::NotFound => Err(ApiError::RecordingNotFound),
        Resolution::TransientFailure(CloudError::Unauthorized) => {
            Ok(session.revoke(&state.sessions))
        }
        Resolution::TransientFailure(err) => {
            tracing::warn!(error = %err, "voicemail lookup failed");
            Err(ApiError::RecordingNotFound)
        }
    }
}

async fn save_attachment(
    State(state): State<AppState>,
    session: ApiSession,
    Json(body): Json<SaveAttachmentRequest>,
) -> Result<Response, ApiError> {
    if body.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("FileName is required"));
    }
    let settings = EwsSettings {
        endpoint: body.ews_url,
        access_token: body.auth_token,
    };
    let content = state
        .mail
        .fetch_attachment(&settings, &body.attachment_id)
        .await?;

    let document = NewDocument::new(body.file_name.clone(), body.workspace_id);
    let upload_uri = match state
        .cloud
        .create_document(&session.credential, &document)
        .await
    {
        Ok(uri) => uri,
        Err(CloudError::Unauthorized) => return Ok(session.revoke(&state.sessions)),
        Err(err) => return Err(err.into()),
    };

    let content_type = match body.content_type.trim() {
        "" => DEFAULT_CONTENT_TYPE,
        value => value,
    };
    state
        .cloud
        .upload_document(&upload_uri, &body.file_name, content_type, content)
        .await?;
    Ok(StatusCode::OK.into_response())
}

async fn download_file(
    State(state): State<AppState>,
    Path((key, document_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let credential = state
        .tokens
        .redeem(&key)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let document = match state.cloud.download_document(&credential, &document_id).await {
        Ok(document) => document,
        Err(CloudError::Unauthorized) => return Err(ApiError::Unauthenticated),
        Err(err) => return Err(err.into()),
    };
    let content_type = document
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], document.bytes).into_response())
}

async fn trace(body: Bytes) -> StatusCode {
    tracing::info!(body = %String::from_utf8_lossy(&body), "client trace");
    StatusCode::OK
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        correlation_backend: state.tokens.backend_name(),
    })
}

async fn serve_page(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Response, ApiError> {
    let relative = public_relative_path(&page).ok_or(ApiError::NotFound)?;
    let path = state.settings.public_dir.join(relative);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(page = %page, error = %err, "page not served");
            return Err(ApiError::NotFound);
        }
    };
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes).into_response())
}

/// `None` for anything that could leave the public directory.
fn public_relative_path(page: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in page.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            segment if segment.contains(['\\', ':', '\0']) => return None,
            segment => relative.push(segment),
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn content_type_for(path: &FsPath) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("xml") => "application/xml",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub(crate) fn router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/{*page}", get(serve_page))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/oauth2/callback", get(oauth_callback))
        .route("/logout", get(logout).post(logout))
        .route(
            "/preparetoattachfile",
            get(prepare_to_attach_file).post(prepare_to_attach_file),
        )
        .route("/getrecordingurl", post(get_recording_url))
        .route("/saveattachment", post(save_attachment))
        .route("/downloadfile/{key}/{document_id}", get(download_file))
        .route("/trace", post(trace))
        .route("/health", get(health))
        .merge(pages)
        .with_state(state)
}

/// Serves until Ctrl+C or SIGTERM; in-flight requests complete first.
pub(crate) async fn run(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(bind_addr, "mail bridge listening (Ctrl+C/SIGTERM to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("mail bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}
