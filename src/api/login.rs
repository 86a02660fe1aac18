//! QR login endpoints
//!
//! GET    /modules                                  - List login modules
//! POST   /modules/:module/sessions                 - Start a login session
//! GET    /modules/:module/sessions/:id/qrcode      - QR image URL
//! GET    /modules/:module/sessions/:id/image       - QR image bytes
//! GET    /modules/:module/sessions/:id/check       - Poll login state
//! DELETE /modules/:module/sessions/:id             - End a session

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::AppState;
use crate::core::ImageFormat;
use crate::errors::{Result, SurfError};
use crate::sessions::Session;
use crate::types::LoginStatus;

#[derive(Debug, Serialize, Deserialize)]
pub struct ModuleListResponse {
    pub modules: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub module: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrCodeResponse {
    pub session_id: String,
    pub qrcode_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageParams {
    /// `base64` returns JSON instead of raw bytes
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub session_id: String,
    pub mime_type: String,
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckLoginResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<HashMap<String, String>>,
}

impl AppState {
    /// Look a session up under the module it was created for. A session
    /// addressed through another module is reported as missing.
    async fn session_for(&self, module: &str, id: &str) -> Result<Arc<Session>> {
        self.modules.get(module)?;
        let session = self.sessions.get_session(id).await?;
        if session.module().name() != module {
            return Err(SurfError::SessionNotFound(id.to_string()));
        }
        Ok(session)
    }
}

pub(super) async fn list_modules(State(state): State<AppState>) -> Json<ModuleListResponse> {
    Json(ModuleListResponse {
        modules: state.modules.list(),
    })
}

pub(super) async fn create_session(
    State(state): State<AppState>,
    Path(module): Path<String>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let module = state.modules.get(&module)?;
    let session = state
        .sessions
        .create_session(module, state.config.browser.headless)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
            module: session.module().name().to_string(),
        }),
    ))
}

pub(super) async fn get_qr_code(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
) -> Result<Json<QrCodeResponse>> {
    let session = state.session_for(&module, &id).await?;
    let qrcode_url = session.module().get_login_qr_code(&session).await?;

    Ok(Json(QrCodeResponse {
        session_id: id,
        qrcode_url,
    }))
}

pub(super) async fn get_qr_image(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    Query(params): Query<ImageParams>,
) -> Result<Response> {
    let session = state.session_for(&module, &id).await?;
    let image = session.module().get_login_qr_code_image(&session).await?;
    let mime_type = ImageFormat::Png.mime_type();

    match params.format.as_deref() {
        Some("base64") => Ok(Json(ImageResponse {
            session_id: id,
            mime_type: mime_type.to_string(),
            image: base64::engine::general_purpose::STANDARD.encode(image),
        })
        .into_response()),
        Some(other) => Err(SurfError::InvalidRequest(format!(
            "Unknown image format '{}'",
            other
        ))),
        None => Ok(([(header::CONTENT_TYPE, mime_type)], image).into_response()),
    }
}

/// Poll once. On success the cookies are returned and the session is torn
/// down in the same request.
pub(super) async fn check_login(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
) -> Result<Json<CheckLoginResponse>> {
    let session = state.session_for(&module, &id).await?;
    let status = session.module().check_login(&session).await?;

    match status {
        LoginStatus::Pending => Ok(Json(CheckLoginResponse {
            logged_in: false,
            cookies: None,
        })),
        LoginStatus::LoggedIn(cookies) => {
            info!("Session {} logged in with {} cookies", id, cookies.len());
            drop(session);
            if let Err(e) = state.sessions.delete_session(&id).await {
                warn!("Failed to close session {} after login: {}", id, e);
            }
            Ok(Json(CheckLoginResponse {
                logged_in: true,
                cookies: Some(cookies),
            }))
        }
    }
}

/// Idempotent: unknown ids succeed with nothing to do.
pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    match state.session_for(&module, &id).await {
        Ok(_) => state.sessions.delete_session(&id).await?,
        Err(SurfError::SessionNotFound(_)) => {}
        Err(e) => return Err(e),
    }
    Ok(StatusCode::NO_CONTENT)
}
