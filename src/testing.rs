//! Scriptable in-memory browser for exercising modules and sessions
//! without Chrome.
//!
//! Pages are described per URL with [`MockPageSpec`]. Every `open` clones
//! the spec into a fresh [`MockPage`] that tests can mutate afterwards, for
//! example to make a login marker appear.

use crate::core::{BrowserDriver, DriverLauncher, ImageFormat, PageElement, PageHandle};
use crate::errors::{Result, SurfError};
use crate::types::CookieData;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An element on a mock page.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub text: String,
    pub html: String,
    pub attributes: HashMap<String, String>,
    pub image: Vec<u8>,
    /// Elements inserted into the page when this one is clicked
    pub reveals: Vec<(String, MockElement)>,
}

impl MockElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn image(mut self, bytes: &[u8]) -> Self {
        self.image = bytes.to_vec();
        self
    }

    pub fn reveals(mut self, selector: &str, element: MockElement) -> Self {
        self.reveals.push((selector.to_string(), element));
        self
    }
}

/// What a page looks like right after navigation.
#[derive(Debug, Clone, Default)]
pub struct MockPageSpec {
    pub elements: HashMap<String, MockElement>,
    pub cookies: Vec<CookieData>,
}

impl MockPageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, selector: &str, element: MockElement) -> Self {
        self.elements.insert(selector.to_string(), element);
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(CookieData {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }
}

/// A live mock page. Shared between the page handle and the test.
#[derive(Debug)]
pub struct MockPage {
    url: Mutex<String>,
    elements: Mutex<HashMap<String, MockElement>>,
    cookies: Mutex<Vec<CookieData>>,
    clicks: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockPage {
    fn from_spec(url: &str, spec: MockPageSpec) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            elements: Mutex::new(spec.elements),
            cookies: Mutex::new(spec.cookies),
            clicks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn current_url(&self) -> String {
        lock(&self.url).clone()
    }

    pub fn set_url(&self, url: &str) {
        *lock(&self.url) = url.to_string();
    }

    pub fn insert_element(&self, selector: &str, element: MockElement) {
        lock(&self.elements).insert(selector.to_string(), element);
    }

    pub fn remove_element(&self, selector: &str) {
        lock(&self.elements).remove(selector);
    }

    pub fn add_cookie(&self, name: &str, value: &str) {
        lock(&self.cookies).push(CookieData {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn clicks(&self) -> Vec<String> {
        lock(&self.clicks).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn element(&self, selector: &str) -> Option<MockElement> {
        lock(&self.elements).get(selector).cloned()
    }
}

#[derive(Default)]
struct MockBrowserState {
    sites: Mutex<HashMap<String, MockPageSpec>>,
    pages: Mutex<Vec<(String, Arc<MockPage>)>>,
    close_counters: Mutex<Vec<Arc<AtomicUsize>>>,
    launches: Mutex<Vec<bool>>,
    fail_launches: AtomicBool,
    fail_closes: AtomicBool,
    disconnected: AtomicBool,
}

/// Launcher and shared bookkeeping for every mock driver it hands out.
#[derive(Clone, Default)]
pub struct MockBrowser {
    state: Arc<MockBrowserState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `spec` for every navigation to `url`.
    pub fn with_page(self, url: &str, spec: MockPageSpec) -> Self {
        lock(&self.state.sites).insert(url.to_string(), spec);
        self
    }

    pub fn fail_launches(&self, fail: bool) {
        self.state.fail_launches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_closes(&self, fail: bool) {
        self.state.fail_closes.store(fail, Ordering::SeqCst);
    }

    /// Simulate every driver losing its connection to the browser.
    pub fn disconnect(&self, down: bool) {
        self.state.disconnected.store(down, Ordering::SeqCst);
    }

    /// A driver that is not counted as a launch.
    pub fn driver(&self) -> MockDriver {
        self.new_driver()
    }

    pub fn launch_count(&self) -> usize {
        lock(&self.state.launches).len()
    }

    pub fn last_launch_headless(&self) -> Option<bool> {
        lock(&self.state.launches).last().copied()
    }

    /// Close calls per driver, in creation order.
    pub fn driver_close_counts(&self) -> Vec<usize> {
        lock(&self.state.close_counters)
            .iter()
            .map(|counter| counter.load(Ordering::SeqCst))
            .collect()
    }

    /// How many times `url` has been opened, across all drivers.
    pub fn open_count(&self, url: &str) -> usize {
        lock(&self.state.pages)
            .iter()
            .filter(|(opened, _)| opened == url)
            .count()
    }

    pub fn pages(&self) -> Vec<Arc<MockPage>> {
        lock(&self.state.pages)
            .iter()
            .map(|(_, page)| page.clone())
            .collect()
    }

    pub fn last_page(&self) -> Option<Arc<MockPage>> {
        lock(&self.state.pages).last().map(|(_, page)| page.clone())
    }

    fn new_driver(&self) -> MockDriver {
        let closes = Arc::new(AtomicUsize::new(0));
        lock(&self.state.close_counters).push(closes.clone());
        MockDriver {
            state: self.state.clone(),
            closes,
        }
    }
}

#[async_trait]
impl DriverLauncher for MockBrowser {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserDriver>> {
        if self.state.fail_launches.load(Ordering::SeqCst) {
            return Err(SurfError::DriverUnavailable(
                "mock launch refused".to_string(),
            ));
        }
        lock(&self.state.launches).push(headless);
        Ok(Box::new(self.new_driver()))
    }
}

pub struct MockDriver {
    state: Arc<MockBrowserState>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn open(&self, url: &str) -> Result<Arc<dyn PageHandle>> {
        if self.closes.load(Ordering::SeqCst) > 0 {
            return Err(SurfError::DriverUnavailable("driver closed".to_string()));
        }
        let spec = lock(&self.state.sites).get(url).cloned().unwrap_or_default();
        let page = Arc::new(MockPage::from_spec(url, spec));
        lock(&self.state.pages).push((url.to_string(), page.clone()));
        Ok(Arc::new(MockPageHandle { page }))
    }

    async fn is_connected(&self) -> bool {
        self.closes.load(Ordering::SeqCst) == 0 && !self.state.disconnected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_closes.load(Ordering::SeqCst) {
            return Err(SurfError::ChromeError("mock close failed".to_string()));
        }
        Ok(())
    }
}

pub struct MockPageHandle {
    page: Arc<MockPage>,
}

#[async_trait]
impl PageHandle for MockPageHandle {
    async fn url(&self) -> Result<String> {
        Ok(self.page.current_url())
    }

    async fn wait_stable(&self) -> Result<()> {
        Ok(())
    }

    async fn locate(&self, selector: &str) -> Result<Box<dyn PageElement>> {
        self.query(selector)
            .await?
            .ok_or_else(|| SurfError::ElementNotFound(selector.to_string()))
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>> {
        Ok(self.page.element(selector).map(|_| {
            Box::new(MockElementHandle {
                page: self.page.clone(),
                selector: selector.to_string(),
            }) as Box<dyn PageElement>
        }))
    }

    async fn cookies(&self) -> Result<Vec<CookieData>> {
        Ok(lock(&self.page.cookies).clone())
    }

    async fn close(&self) -> Result<()> {
        self.page.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockElementHandle {
    page: Arc<MockPage>,
    selector: String,
}

impl MockElementHandle {
    fn resolve(&self) -> Result<MockElement> {
        self.page
            .element(&self.selector)
            .ok_or_else(|| SurfError::ElementNotFound(self.selector.clone()))
    }
}

#[async_trait]
impl PageElement for MockElementHandle {
    async fn text(&self) -> Result<String> {
        Ok(self.resolve()?.text)
    }

    async fn html(&self) -> Result<String> {
        Ok(self.resolve()?.html)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.resolve()?.attributes.get(name).cloned())
    }

    async fn click(&self) -> Result<()> {
        let element = self.resolve()?;
        lock(&self.page.clicks).push(self.selector.clone());
        for (selector, revealed) in element.reveals {
            self.page.insert_element(&selector, revealed);
        }
        Ok(())
    }

    async fn screenshot(&self, _format: ImageFormat) -> Result<Vec<u8>> {
        let element = self.resolve()?;
        if element.image.is_empty() {
            return Err(SurfError::ScreenshotFailed(format!(
                "{} has nothing to capture",
                self.selector
            )));
        }
        Ok(element.image)
    }
}
