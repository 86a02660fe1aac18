use crate::core::{BrowserDriver, FetchConfig, PageHandle};
use crate::errors::Result;
use crate::types::{ContentKind, FetchRequest, FetchResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One-shot text/HTML extraction on a shared browser.
///
/// Each call opens its own page and closes it again; nothing is kept between
/// calls.
pub struct ContentFetcher {
    driver: Arc<dyn BrowserDriver>,
    config: FetchConfig,
}

impl ContentFetcher {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: FetchConfig) -> Self {
        Self { driver, config }
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult> {
        info!("Fetching {} from {}", request.kind, request.url);
        let page = self.driver.open(&request.url).await?;

        let content = self.extract(page.as_ref(), request).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", request.url, e);
        }

        Ok(FetchResult {
            url: request.url.clone(),
            kind: request.kind,
            content: content?,
            css_path: request.css_path.clone().unwrap_or_default(),
            click_css_path: request.click_css_path.clone().unwrap_or_default(),
        })
    }

    async fn extract(&self, page: &dyn PageHandle, request: &FetchRequest) -> Result<String> {
        page.wait_stable().await?;
        pause(self.config.settle_ms).await;

        if let Some(click_selector) = request.click_css_path.as_deref() {
            debug!("Clicking element {}", click_selector);
            page.locate(click_selector).await?.click().await?;
            pause(self.config.click_settle_ms).await;
            page.wait_stable().await?;
        }

        let selector = request.css_path.as_deref().unwrap_or("body");
        debug!("Reading {} of {}", request.kind, selector);
        let element = page.locate(selector).await?;

        match request.kind {
            ContentKind::Text => element.text().await,
            ContentKind::Html => element.html().await,
        }
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SurfError;
    use crate::testing::{MockBrowser, MockElement, MockPageSpec};
    use tokio_test::assert_err;

    const URL: &str = "https://example.com/";

    fn site() -> MockBrowser {
        MockBrowser::new().with_page(
            URL,
            MockPageSpec::new()
                .element(
                    "body",
                    MockElement::new()
                        .text("Example Domain")
                        .html("<body><h1>Example Domain</h1></body>"),
                )
                .element(
                    ".load-more",
                    MockElement::new().reveals(
                        ".result",
                        MockElement::new().text("more results").html("<div>more</div>"),
                    ),
                ),
        )
    }

    fn fetcher(browser: &MockBrowser) -> ContentFetcher {
        ContentFetcher::new(Arc::new(browser.driver()), FetchConfig::immediate())
    }

    fn request(kind: ContentKind, css: Option<&str>, click: Option<&str>) -> FetchRequest {
        FetchRequest {
            url: URL.to_string(),
            kind,
            css_path: css.map(str::to_string),
            click_css_path: click.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_whole_body_text() {
        let browser = site();
        let result = fetcher(&browser)
            .fetch(&request(ContentKind::Text, None, None))
            .await
            .unwrap();

        assert_eq!(result.content, "Example Domain");
        assert_eq!(result.css_path, "");
        assert!(browser.last_page().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_click_then_selector_html() {
        let browser = site();
        let result = fetcher(&browser)
            .fetch(&request(ContentKind::Html, Some(".result"), Some(".load-more")))
            .await
            .unwrap();

        assert_eq!(result.content, "<div>more</div>");
        assert_eq!(result.click_css_path, ".load-more");
        assert_eq!(browser.last_page().unwrap().clicks(), vec![".load-more"]);
    }

    #[tokio::test]
    async fn test_missing_click_target_closes_page() {
        let browser = site();
        let err = assert_err!(
            fetcher(&browser)
                .fetch(&request(ContentKind::Text, None, Some(".nope")))
                .await
        );

        assert!(matches!(err, SurfError::ElementNotFound(_)));
        assert!(browser.last_page().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_missing_content_selector() {
        let browser = site();
        let err = assert_err!(
            fetcher(&browser)
                .fetch(&request(ContentKind::Text, Some(".result"), None))
                .await
        );
        assert!(matches!(err, SurfError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_each_fetch_opens_a_fresh_page() {
        let browser = site();
        let fetcher = fetcher(&browser);
        fetcher
            .fetch(&request(ContentKind::Text, None, Some(".load-more")))
            .await
            .unwrap();
        // the click on the first page must not leak into the second
        let err = assert_err!(
            fetcher
                .fetch(&request(ContentKind::Text, Some(".result"), None))
                .await
        );
        assert!(matches!(err, SurfError::ElementNotFound(_)));
        assert_eq!(browser.open_count(URL), 2);
    }
}
