//! Daxuesoutijiang QR login.
//!
//! The QR code is drawn on a `<canvas>`, so there is no image URL to hand
//! out. The canvas is captured into the session instead and
//! `get_login_qr_code` returns [`SESSION_IMAGE_MARKER`].
//!
//! Login is detected by the presence of `.user-info`; `.error-message`
//! means the site rejected the attempt. Both selectors are heuristics tied
//! to the current site layout.
//!
//! Page access for all Daxuesoutijiang sessions goes through one lock, held
//! across the settle delays of a capture (about 9 s with the defaults).
//! `check_login` on other sessions of this module waits out a capture.

use super::{
    harvest_cookies, open_session_page, require_page, settle, AuthModule, SettleDelays,
    QR_IMAGE_KEY,
};
use crate::core::ImageFormat;
use crate::errors::{Result, SurfError};
use crate::sessions::{ScratchValue, Session};
use crate::types::LoginStatus;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Returned instead of a URL when the QR image lives in the session.
pub const SESSION_IMAGE_MARKER: &str = "session_image";

const HOME_URL: &str = "https://www.daxuesoutijiang.com/";
const LOGIN_BUTTON_SELECTOR: &str =
    "#main > div.header-container > header > div > div.header-nav > button";
const QR_CANVAS_SELECTOR: &str = "#dx-login-dialog-container > div > div > div.login-by-qrcode-wrapper > div > div.login-by-qrcode-content > canvas";
const SUCCESS_MARKER: &str = ".user-info";
const FAILURE_MARKER: &str = ".error-message";

pub struct DaxuesoutijiangModule {
    page_lock: Mutex<()>,
    delays: SettleDelays,
}

impl DaxuesoutijiangModule {
    pub fn new() -> Self {
        Self::with_delays(SettleDelays {
            after_load: Duration::from_secs(2),
            after_switch: Duration::from_secs(2),
            before_qr: Duration::from_secs(5),
        })
    }

    pub fn with_delays(delays: SettleDelays) -> Self {
        Self {
            page_lock: Mutex::new(()),
            delays,
        }
    }

    /// Open the home page, bring up the login dialog and capture the QR
    /// canvas into scratch. Caller holds `page_lock`.
    async fn capture_qr(&self, session: &Session) -> Result<Vec<u8>> {
        info!("Opening Daxuesoutijiang home page for session {}", session.id());
        let page = open_session_page(session, HOME_URL).await?;
        page.wait_stable().await?;
        settle(self.delays.after_load).await;

        page.locate(LOGIN_BUTTON_SELECTOR).await?.click().await?;
        settle(self.delays.after_switch).await;

        page.wait_stable().await?;
        settle(self.delays.before_qr).await;

        let canvas = page.locate(QR_CANVAS_SELECTOR).await?;
        let image = canvas.screenshot(ImageFormat::Png).await?;
        session
            .scratch_insert(QR_IMAGE_KEY, ScratchValue::Bytes(image.clone()))
            .await;

        info!("Captured Daxuesoutijiang QR canvas for session {}", session.id());
        Ok(image)
    }
}

impl Default for DaxuesoutijiangModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthModule for DaxuesoutijiangModule {
    fn name(&self) -> &str {
        "daxuesoutijiang"
    }

    async fn get_login_qr_code(&self, session: &Session) -> Result<String> {
        let _guard = self.page_lock.lock().await;
        self.capture_qr(session).await?;
        Ok(SESSION_IMAGE_MARKER.to_string())
    }

    async fn get_login_qr_code_image(&self, session: &Session) -> Result<Vec<u8>> {
        if let Some(image) = session.scratch_bytes(QR_IMAGE_KEY).await {
            return Ok(image);
        }

        let _guard = self.page_lock.lock().await;
        if let Some(image) = session.scratch_bytes(QR_IMAGE_KEY).await {
            return Ok(image);
        }
        self.capture_qr(session).await
    }

    async fn check_login(&self, session: &Session) -> Result<LoginStatus> {
        let page = require_page(session).await?;
        let _guard = self.page_lock.lock().await;

        debug!("Daxuesoutijiang session {} at {}", session.id(), page.url().await?);

        if page.query(SUCCESS_MARKER).await?.is_some() {
            info!("Daxuesoutijiang session {} logged in", session.id());
            return harvest_cookies(page.as_ref()).await;
        }

        if page.query(FAILURE_MARKER).await?.is_some() {
            return Err(SurfError::LoginFailed(
                "Daxuesoutijiang reported a login error, request a new QR code".to_string(),
            ));
        }

        Ok(LoginStatus::Pending)
    }
}
