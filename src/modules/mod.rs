pub mod baidu;
pub mod daxuesoutijiang;
pub mod registry;

pub use baidu::BaiduModule;
pub use daxuesoutijiang::DaxuesoutijiangModule;
pub use registry::ModuleRegistry;

use crate::core::PageHandle;
use crate::errors::{Result, SurfError};
use crate::sessions::Session;
use crate::types::LoginStatus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Scratch key for the QR image URL
pub const QR_URL_KEY: &str = "qr_url";
/// Scratch key for the cached QR image bytes
pub const QR_IMAGE_KEY: &str = "qr_image";

/// A site-specific QR-code login flow.
///
/// One instance serves every session of its site, so implementations must
/// be safe to share. Success detection is a heuristic over URLs and page
/// markers; each implementation documents the rules it applies.
#[async_trait]
pub trait AuthModule: Send + Sync {
    /// Registry key and routing name
    fn name(&self) -> &str;

    /// Load the login surface and return the QR image URL.
    async fn get_login_qr_code(&self, session: &Session) -> Result<String>;

    /// QR image bytes. Cached in the session after the first call.
    async fn get_login_qr_code_image(&self, session: &Session) -> Result<Vec<u8>>;

    /// Poll once for login completion. Never sleeps or retries.
    async fn check_login(&self, session: &Session) -> Result<LoginStatus>;

    /// Release the session's browser. The manager calls this at most once.
    async fn close(&self, session: &Session) -> Result<()> {
        session.driver().close().await
    }
}

/// Pauses a module takes while the target site renders.
#[derive(Debug, Clone, Copy)]
pub struct SettleDelays {
    pub after_load: Duration,
    pub after_switch: Duration,
    pub before_qr: Duration,
}

impl SettleDelays {
    pub fn none() -> Self {
        Self {
            after_load: Duration::ZERO,
            after_switch: Duration::ZERO,
            before_qr: Duration::ZERO,
        }
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Page established by `get_login_qr_code`, or `SessionNotReady`.
pub(crate) async fn require_page(session: &Session) -> Result<Arc<dyn PageHandle>> {
    session.page().await.ok_or_else(|| {
        SurfError::SessionNotReady(format!(
            "session {} has no page, request the login QR code first",
            session.id()
        ))
    })
}

/// Open `url` as the session's current page, closing whatever it replaces.
pub(crate) async fn open_session_page(
    session: &Session,
    url: &str,
) -> Result<Arc<dyn PageHandle>> {
    let page = session.driver().open(url).await?;
    if let Some(previous) = session.set_page(page.clone()).await {
        if let Err(e) = previous.close().await {
            tracing::warn!("Failed to close previous page of {}: {}", session.id(), e);
        }
    }
    Ok(page)
}

/// Every cookie the page can currently see, as a logged-in status.
pub(crate) async fn harvest_cookies(page: &dyn PageHandle) -> Result<LoginStatus> {
    let cookies = page.cookies().await?;
    Ok(LoginStatus::from_cookies(cookies))
}

/// Resolve a QR `src` attribute against the site origin.
pub(crate) fn resolve_qr_url(origin: &str, src: &str) -> Result<String> {
    let base = url::Url::parse(origin).map_err(SurfError::from_any_error)?;
    base.join(src)
        .map(|url| url.to_string())
        .map_err(|e| SurfError::InvalidRequest(format!("bad QR src '{}': {}", src, e)))
}
