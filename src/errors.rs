use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfError {
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SurfError>;

// headless_chrome reports everything as anyhow::Error
impl From<anyhow::Error> for SurfError {
    fn from(err: anyhow::Error) -> Self {
        SurfError::ChromeError(err.to_string())
    }
}

impl SurfError {
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        SurfError::ChromeError(err.to_string())
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SurfError::DriverUnavailable(_) => "DRIVER_UNAVAILABLE",
            SurfError::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            SurfError::SessionNotReady(_) => "SESSION_NOT_READY",
            SurfError::LoginFailed(_) => "LOGIN_FAILED",
            SurfError::SessionNotFound(_) | SurfError::ModuleNotFound(_) => "NOT_FOUND",
            SurfError::NavigationFailed(_) => "NAVIGATION_FAILED",
            SurfError::ScreenshotFailed(_) => "SCREENSHOT_FAILED",
            SurfError::InvalidRequest(_) => "INVALID_REQUEST",
            SurfError::SerializationError(_) => "SERIALIZATION_ERROR",
            SurfError::ChromeError(_) => "CHROME_ERROR",
            SurfError::IoError(_) => "IO_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SurfError::SessionNotFound(_) | SurfError::ModuleNotFound(_)
        )
    }
}
