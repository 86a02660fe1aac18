use crate::errors::Result;
use crate::types::CookieData;
use async_trait::async_trait;
use std::sync::Arc;

/// Acquires fresh browser connections.
///
/// Every login session owns the driver it gets from here; nothing else
/// ever touches it.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    /// Launch a new browser in headless or headed mode.
    ///
    /// Failures are reported as `SurfError::DriverUnavailable`.
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserDriver>>;
}

/// A live browser connection.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a new page and navigate it to `url`
    async fn open(&self, url: &str) -> Result<Arc<dyn PageHandle>>;

    /// Ask the browser to answer a round trip. False once closed or when
    /// the connection has dropped.
    async fn is_connected(&self) -> bool;

    /// Release the browser process. Calling this twice is a caller bug.
    async fn close(&self) -> Result<()>;
}

/// A page inside a [`BrowserDriver`].
///
/// Calls block until the browser answers. There is no way to abort a
/// navigation that is already in flight.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Current URL of the page
    async fn url(&self) -> Result<String>;

    /// Wait until the document has finished loading
    async fn wait_stable(&self) -> Result<()>;

    /// Find an element, waiting up to the driver's element budget.
    ///
    /// Returns `SurfError::ElementNotFound` when the budget runs out.
    async fn locate(&self, selector: &str) -> Result<Box<dyn PageElement>>;

    /// Look an element up once, without waiting.
    async fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>>;

    /// All cookies visible to the page
    async fn cookies(&self) -> Result<Vec<CookieData>>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PageElement: Send + Sync {
    async fn text(&self) -> Result<String>;

    async fn html(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn click(&self) -> Result<()>;

    async fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}
