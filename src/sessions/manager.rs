use crate::core::{DriverLauncher, SessionConfig};
use crate::errors::{Result, SurfError};
use crate::modules::AuthModule;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::Session;

/// Custody of every live login session.
///
/// A session leaves the map under the write lock, and only the task that
/// removed it may close it. That keeps closes at most once per session even
/// when an explicit delete and the sweep race on the same id.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    launcher: Arc<dyn DriverLauncher>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn DriverLauncher>, config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            launcher,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Launch a browser for `module` and register a new session around it.
    pub async fn create_session(
        &self,
        module: Arc<dyn AuthModule>,
        headless: bool,
    ) -> Result<Arc<Session>> {
        let driver = self
            .launcher
            .launch(headless)
            .await
            .map_err(|e| match e {
                SurfError::DriverUnavailable(_) => e,
                other => SurfError::DriverUnavailable(other.to_string()),
            })?;

        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Arc::new(Session::new(id.clone(), driver, module));
        sessions.insert(id.clone(), session.clone());
        drop(sessions);

        info!(
            "Created session {} for module {} (headless: {})",
            id,
            session.module().name(),
            headless
        );
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SurfError::SessionNotFound(id.to_string()))
    }

    /// Remove and close a session. Unknown ids are not an error.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let removed = self.sessions.write().await.remove(id);

        match removed {
            Some(session) => {
                info!("Deleting session {}", id);
                session.module().close(&session).await
            }
            None => {
                debug!("Delete of unknown session {} ignored", id);
                Ok(())
            }
        }
    }

    pub async fn list_sessions(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close every session older than the configured ttl as of `now`.
    ///
    /// Close failures are logged and do not stop the sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = match chrono::Duration::from_std(self.config.ttl()) {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(
                    "Session ttl {}s is out of range, nothing expires: {}",
                    self.config.ttl_secs, e
                );
                return 0;
            }
        };

        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.is_expired(now, ttl))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            if let Err(e) = session.module().close(session).await {
                warn!("Failed to close expired session {}: {}", session.id(), e);
            }
        }

        if !expired.is_empty() {
            info!("Sweep removed {} expired sessions", expired.len());
        }
        expired.len()
    }

    /// Run the expiry sweep every `sweep_interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = self.config.sweep_interval();

        tokio::spawn(async move {
            info!("Session sweeper started (interval: {:?})", interval);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        manager.sweep_expired(Utc::now()).await;
                    }
                    _ = shutdown.cancelled() => {
                        info!("Session sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Close every live session. Used on process exit.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in &drained {
            if let Err(e) = session.module().close(session).await {
                warn!("Failed to close session {} on shutdown: {}", session.id(), e);
            }
        }
        info!("Closed {} sessions on shutdown", drained.len());
    }
}
