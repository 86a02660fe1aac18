use crate::errors::SurfError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl SurfError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SurfError::SessionNotFound(_) | SurfError::ModuleNotFound(_) => StatusCode::NOT_FOUND,
            SurfError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SurfError::SessionNotReady(_) => StatusCode::CONFLICT,
            SurfError::LoginFailed(_) => StatusCode::UNAUTHORIZED,
            SurfError::ElementNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SurfError::DriverUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SurfError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SurfError::SessionNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SurfError::SessionNotReady("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            SurfError::LoginFailed("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SurfError::DriverUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SurfError::ChromeError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status() {
        let response = SurfError::ElementNotFound(".qr".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
