use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub session: SessionConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    /// How long `locate` keeps looking for an element
    pub element_timeout_ms: u64,
    /// Upper bound for `wait_stable`
    pub stable_timeout_ms: u64,
    /// Silence after which the browser connection is dropped. Must outlive
    /// login sessions, which sit idle while the user scans the QR code.
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions older than this are closed by the sweep
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub settle_ms: u64,
    pub click_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            debug: false,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
            element_timeout_ms: 5000,
            stable_timeout_ms: 30000,
            idle_timeout_secs: 2 * 60 * 60,
        }
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn stable_timeout(&self) -> Duration {
        Duration::from_millis(self.stable_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            click_settle_ms: 2000,
        }
    }
}

impl FetchConfig {
    /// No settle delays, for tests and scripted drivers.
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            click_settle_ms: 0,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_browser_outlives_idle_sessions() {
        let config = Config::default();
        assert!(config.browser.idle_timeout() >= config.session.ttl());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.fetch.click_settle_ms, 2000);
    }
}
