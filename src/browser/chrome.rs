use crate::core::{BrowserConfig, BrowserDriver, DriverLauncher, ImageFormat, PageElement, PageHandle};
use crate::errors::{Result, SurfError};
use crate::types::CookieData;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// headless_chrome calls block the calling thread, so run them off the
/// async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(SurfError::from_any_error)?
}

/// Pass `result` through, running `discard` first when it failed.
fn discard_on_error<T>(result: Result<T>, discard: impl FnOnce() -> Result<()>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = discard() {
            warn!("Failed to discard tab after error: {}", e);
        }
    }
    result
}

/// Launches Chrome processes with a shared configuration.
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn launch_blocking(config: &BrowserConfig, headless: bool) -> Result<Browser> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(headless)
            .idle_browser_timeout(config.idle_timeout())
            .args(args)
            .build()
            .map_err(|e| SurfError::DriverUnavailable(e.to_string()))?;

        Browser::new(launch_options).map_err(|e| SurfError::DriverUnavailable(e.to_string()))
    }
}

#[async_trait]
impl DriverLauncher for ChromeLauncher {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserDriver>> {
        let config = self.config.clone();
        let browser =
            blocking(move || ChromeLauncher::launch_blocking(&config, headless)).await?;
        debug!("Chrome launched (headless: {})", headless);

        Ok(Box::new(ChromeDriver {
            browser: Mutex::new(Some(browser)),
            element_timeout: self.config.element_timeout(),
            stable_timeout: self.config.stable_timeout(),
        }))
    }
}

/// One Chrome process.
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    element_timeout: Duration,
    stable_timeout: Duration,
}

impl ChromeDriver {
    fn browser(&self) -> Result<Browser> {
        self.browser
            .lock()
            .map_err(SurfError::from_any_error)?
            .clone()
            .ok_or_else(|| SurfError::DriverUnavailable("browser already closed".to_string()))
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn open(&self, url: &str) -> Result<Arc<dyn PageHandle>> {
        let browser = self.browser()?;
        let url = url.to_string();

        let tab = blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| SurfError::DriverUnavailable(e.to_string()))?;
            let navigated = tab
                .navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| SurfError::NavigationFailed(e.to_string()));
            // a failed navigation still leaves the tab open in the browser
            discard_on_error(navigated, || {
                tab.close(true)?;
                Ok(())
            })?;
            Ok(tab)
        })
        .await?;

        Ok(Arc::new(ChromePage {
            tab,
            element_timeout: self.element_timeout,
            stable_timeout: self.stable_timeout,
        }))
    }

    async fn is_connected(&self) -> bool {
        let browser = match self.browser() {
            Ok(browser) => browser,
            Err(_) => return false,
        };
        blocking(move || {
            browser.get_version()?;
            Ok(())
        })
        .await
        .is_ok()
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last handle kills the Chrome process
        let browser = self
            .browser
            .lock()
            .map_err(SurfError::from_any_error)?
            .take();
        if browser.is_none() {
            warn!("Chrome driver closed twice");
        }
        drop(browser);
        Ok(())
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    element_timeout: Duration,
    stable_timeout: Duration,
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn wait_stable(&self) -> Result<()> {
        let start_time = Instant::now();

        while start_time.elapsed() < self.stable_timeout {
            let tab = self.tab.clone();
            let ready_state = blocking(move || {
                let result = tab.evaluate("document.readyState", false)?;
                Ok(result
                    .value
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default())
            })
            .await;

            if let Ok(state) = ready_state {
                if state == "complete" {
                    return Ok(());
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(SurfError::NavigationFailed(
            "Page did not become stable in time".to_string(),
        ))
    }

    async fn locate(&self, selector: &str) -> Result<Box<dyn PageElement>> {
        let tab = self.tab.clone();
        let owned = selector.to_string();
        let timeout = self.element_timeout;

        blocking(move || {
            tab.wait_for_element_with_custom_timeout(&owned, timeout)
                .map_err(|e| SurfError::ElementNotFound(format!("{}: {}", owned, e)))?;
            Ok(())
        })
        .await?;

        Ok(Box::new(ChromeElement {
            tab: self.tab.clone(),
            selector: selector.to_string(),
        }))
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>> {
        let tab = self.tab.clone();
        let script = format!("document.querySelector({}) !== null", serde_json::to_string(selector)?);

        let found = blocking(move || {
            let result = tab.evaluate(&script, false)?;
            Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
        })
        .await?;

        if !found {
            return Ok(None);
        }

        Ok(Some(Box::new(ChromeElement {
            tab: self.tab.clone(),
            selector: selector.to_string(),
        })))
    }

    async fn cookies(&self) -> Result<Vec<CookieData>> {
        let tab = self.tab.clone();
        let cookies = blocking(move || Ok(tab.get_cookies()?)).await?;

        Ok(cookies
            .into_iter()
            .map(|cookie| CookieData {
                name: cookie.name,
                value: cookie.value,
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.close(true)?;
            Ok(())
        })
        .await
    }
}

/// Element handle that re-resolves its selector on each call, since
/// headless_chrome elements borrow their tab.
pub struct ChromeElement {
    tab: Arc<Tab>,
    selector: String,
}

impl ChromeElement {
    async fn with_element<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&headless_chrome::Element<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = self.tab.clone();
        let selector = self.selector.clone();
        blocking(move || {
            let element = tab
                .find_element(&selector)
                .map_err(|e| SurfError::ElementNotFound(format!("{}: {}", selector, e)))?;
            f(&element)
        })
        .await
    }
}

#[async_trait]
impl PageElement for ChromeElement {
    async fn text(&self) -> Result<String> {
        self.with_element(|element| Ok(element.get_inner_text()?))
            .await
    }

    async fn html(&self) -> Result<String> {
        self.with_element(|element| Ok(element.get_content()?))
            .await
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let name = name.to_string();
        self.with_element(move |element| Ok(element.get_attribute_value(&name)?))
            .await
    }

    async fn click(&self) -> Result<()> {
        self.with_element(|element| {
            element.click()?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let format = match format {
            ImageFormat::Png => CaptureScreenshotFormatOption::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormatOption::Jpeg,
        };
        self.with_element(move |element| {
            element
                .capture_screenshot(format)
                .map_err(|e| SurfError::ScreenshotFailed(e.to_string()))
        })
        .await
    }
}
