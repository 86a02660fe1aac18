//! Baidu passport QR login.
//!
//! Login is detected heuristically, in this order:
//! 1. the page left the login URL for one longer than 25 characters, or for
//!    the Baidu or passport home page;
//! 2. a `.user-name` element exists;
//! 3. a `.user-avatar` element exists.
//!
//! A `.pass-state-error` element means the site rejected the attempt. These
//! rules follow the passport UI as currently served and may misfire after
//! redesigns.
//!
//! One lock serializes page access for every Baidu session. Loading a QR
//! code holds it through the settle delays (about 6 s with the defaults),
//! so `check_login` on other Baidu sessions waits that long.

use super::{
    harvest_cookies, open_session_page, require_page, resolve_qr_url, settle, AuthModule,
    SettleDelays, QR_IMAGE_KEY, QR_URL_KEY,
};
use crate::core::{ImageFormat, PageHandle};
use crate::errors::{Result, SurfError};
use crate::sessions::{ScratchValue, Session};
use crate::types::LoginStatus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOGIN_URL: &str = "https://passport.baidu.com/v2/?login";
const ORIGIN: &str = "https://passport.baidu.com";
const HOME_URL: &str = "https://www.baidu.com/";
const PASSPORT_HOME_URL: &str = "https://passport.baidu.com/";

const QR_SWITCH_SELECTOR: &str = "a[data-type='qrcode']";
const QR_IMAGE_SELECTOR: &str = "#TANGRAM__PSP_3__QrcodeMain > img";
const SUCCESS_MARKERS: [&str; 2] = [".user-name", ".user-avatar"];
const FAILURE_MARKER: &str = ".pass-state-error";

pub struct BaiduModule {
    // serializes all page access across this module's sessions
    page_lock: Mutex<()>,
    delays: SettleDelays,
}

impl BaiduModule {
    pub fn new() -> Self {
        Self::with_delays(SettleDelays {
            after_load: Duration::from_secs(2),
            after_switch: Duration::from_secs(1),
            before_qr: Duration::from_secs(3),
        })
    }

    pub fn with_delays(delays: SettleDelays) -> Self {
        Self {
            page_lock: Mutex::new(()),
            delays,
        }
    }

    /// Navigate to the passport login page and make sure the QR tab shows.
    async fn open_login_page(&self, session: &Session) -> Result<Arc<dyn PageHandle>> {
        info!("Opening Baidu login page for session {}", session.id());
        let page = open_session_page(session, LOGIN_URL).await?;
        page.wait_stable().await?;
        settle(self.delays.after_load).await;

        // QR login is usually the default, the switch only exists otherwise
        if let Some(switch) = page.query(QR_SWITCH_SELECTOR).await? {
            debug!("Switching Baidu login to QR mode");
            switch.click().await?;
            settle(self.delays.after_switch).await;
        }

        page.wait_stable().await?;
        settle(self.delays.before_qr).await;
        Ok(page)
    }

    /// Load a fresh login page and record its QR URL and image in scratch.
    ///
    /// Both entries always describe the page `check_login` polls: a failed
    /// capture drops the previous image instead of leaving it behind.
    /// Caller holds `page_lock`.
    async fn capture_qr(&self, session: &Session) -> Result<(String, Result<Vec<u8>>)> {
        let page = self.open_login_page(session).await?;
        let qr = page.locate(QR_IMAGE_SELECTOR).await?;
        let src = qr
            .attribute("src")
            .await?
            .filter(|src| !src.is_empty())
            .ok_or_else(|| {
                SurfError::ElementNotFound(format!("{} has no src", QR_IMAGE_SELECTOR))
            })?;

        let qr_url = resolve_qr_url(ORIGIN, &src)?;
        session
            .scratch_insert(QR_URL_KEY, ScratchValue::Text(qr_url.clone()))
            .await;
        info!("Got Baidu QR code URL for session {}: {}", session.id(), qr_url);

        let image = qr.screenshot(ImageFormat::Png).await;
        match &image {
            Ok(bytes) => {
                session
                    .scratch_insert(QR_IMAGE_KEY, ScratchValue::Bytes(bytes.clone()))
                    .await;
                info!("Captured Baidu QR image for session {}", session.id());
            }
            Err(_) => {
                session.scratch_remove(QR_IMAGE_KEY).await;
            }
        }

        Ok((qr_url, image))
    }

    fn url_indicates_login(url: &str) -> bool {
        url != LOGIN_URL && (url.len() > 25 || url == HOME_URL || url == PASSPORT_HOME_URL)
    }
}

impl Default for BaiduModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthModule for BaiduModule {
    fn name(&self) -> &str {
        "baidu"
    }

    async fn get_login_qr_code(&self, session: &Session) -> Result<String> {
        let _guard = self.page_lock.lock().await;

        let (qr_url, image) = self.capture_qr(session).await?;
        if let Err(e) = image {
            warn!(
                "Baidu QR image for session {} will be captured on request: {}",
                session.id(),
                e
            );
        }
        Ok(qr_url)
    }

    /// Serves the capture taken with the current QR code, loading a fresh
    /// login page only when there is none.
    async fn get_login_qr_code_image(&self, session: &Session) -> Result<Vec<u8>> {
        if let Some(image) = session.scratch_bytes(QR_IMAGE_KEY).await {
            return Ok(image);
        }

        let _guard = self.page_lock.lock().await;
        // another caller may have filled it while we waited
        if let Some(image) = session.scratch_bytes(QR_IMAGE_KEY).await {
            return Ok(image);
        }

        let (_, image) = self.capture_qr(session).await?;
        image
    }

    async fn check_login(&self, session: &Session) -> Result<LoginStatus> {
        let page = require_page(session).await?;
        let _guard = self.page_lock.lock().await;

        let url = page.url().await?;
        if Self::url_indicates_login(&url) {
            info!("Baidu session {} logged in (redirected to {})", session.id(), url);
            return harvest_cookies(page.as_ref()).await;
        }

        for marker in SUCCESS_MARKERS {
            if page.query(marker).await?.is_some() {
                info!("Baidu session {} logged in ({} present)", session.id(), marker);
                return harvest_cookies(page.as_ref()).await;
            }
        }

        if page.query(FAILURE_MARKER).await?.is_some() {
            return Err(SurfError::LoginFailed(
                "Baidu reported a login error, request a new QR code".to_string(),
            ));
        }

        Ok(LoginStatus::Pending)
    }
}
