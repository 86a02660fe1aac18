use crate::core::{BrowserDriver, PageHandle};
use crate::modules::AuthModule;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Module-private values kept between calls on the same session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScratchValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// One login attempt: a browser owned by this session alone, the module
/// driving it, and whatever the module wants to remember in between.
///
/// Ids are not bound to a caller. Anyone holding one may poll the session.
pub struct Session {
    id: String,
    driver: Box<dyn BrowserDriver>,
    page: RwLock<Option<Arc<dyn PageHandle>>>,
    created_at: DateTime<Utc>,
    module: Arc<dyn AuthModule>,
    scratch: Mutex<HashMap<String, ScratchValue>>,
}

impl Session {
    pub fn new(id: String, driver: Box<dyn BrowserDriver>, module: Arc<dyn AuthModule>) -> Self {
        Self {
            id,
            driver,
            page: RwLock::new(None),
            created_at: Utc::now(),
            module,
            scratch: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    pub fn module(&self) -> &Arc<dyn AuthModule> {
        &self.module
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }

    /// The page the module last navigated to, if any.
    pub async fn page(&self) -> Option<Arc<dyn PageHandle>> {
        self.page.read().await.clone()
    }

    /// Replace the current page, returning the previous one.
    pub async fn set_page(&self, page: Arc<dyn PageHandle>) -> Option<Arc<dyn PageHandle>> {
        self.page.write().await.replace(page)
    }

    pub async fn scratch_get(&self, key: &str) -> Option<ScratchValue> {
        self.scratch.lock().await.get(key).cloned()
    }

    pub async fn scratch_insert(&self, key: impl Into<String>, value: ScratchValue) {
        self.scratch.lock().await.insert(key.into(), value);
    }

    pub async fn scratch_remove(&self, key: &str) -> Option<ScratchValue> {
        self.scratch.lock().await.remove(key)
    }

    pub async fn scratch_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.scratch_get(key).await {
            Some(ScratchValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub async fn scratch_text(&self, key: &str) -> Option<String> {
        match self.scratch_get(key).await {
            Some(ScratchValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("module", &self.module.name())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DriverLauncher;
    use crate::modules::DaxuesoutijiangModule;
    use crate::testing::MockBrowser;

    async fn test_session() -> Session {
        let driver = MockBrowser::new().launch(true).await.unwrap();
        Session::new(
            "s-1".to_string(),
            driver,
            Arc::new(DaxuesoutijiangModule::new()),
        )
    }

    #[tokio::test]
    async fn test_scratch_typed_access() {
        let session = test_session().await;
        session
            .scratch_insert("qr_url", ScratchValue::Text("https://x/qr.png".to_string()))
            .await;
        session
            .scratch_insert("qr_image", ScratchValue::Bytes(vec![1, 2, 3]))
            .await;

        assert_eq!(
            session.scratch_text("qr_url").await.as_deref(),
            Some("https://x/qr.png")
        );
        assert_eq!(session.scratch_bytes("qr_image").await, Some(vec![1, 2, 3]));
        // wrong type reads as absent
        assert!(session.scratch_bytes("qr_url").await.is_none());
    }

    #[tokio::test]
    async fn test_expiry_is_strictly_older_than_ttl() {
        let session = test_session().await;
        let ttl = chrono::Duration::hours(1);
        assert!(!session.is_expired(session.created_at() + ttl, ttl));
        assert!(session.is_expired(
            session.created_at() + ttl + chrono::Duration::seconds(1),
            ttl
        ));
    }

    #[tokio::test]
    async fn test_page_starts_empty() {
        let session = test_session().await;
        assert!(session.page().await.is_none());
        assert_eq!(session.module().name(), "daxuesoutijiang");
    }
}
