//! HTTP facade over content extraction and login sessions.

pub mod error;
pub mod fetch;
pub mod login;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::Config;
use crate::errors::Result;
use crate::extract::ContentFetcher;
use crate::modules::ModuleRegistry;
use crate::sessions::SessionManager;

/// Everything the handlers need, passed in explicitly at startup.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub modules: Arc<ModuleRegistry>,
    pub fetcher: Arc<ContentFetcher>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionManager>,
        modules: Arc<ModuleRegistry>,
        fetcher: Arc<ContentFetcher>,
        config: Config,
    ) -> Self {
        Self {
            sessions,
            modules,
            fetcher,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub browser: &'static str,
    pub headless: bool,
    pub port: u16,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let browser = if state.fetcher.driver().is_connected().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "healthy",
        browser,
        headless: state.config.browser.headless,
        port: state.config.server.port,
    })
}

async fn usage(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "textsurf browser web service",
        "version": env!("CARGO_PKG_VERSION"),
        "usage": {
            "endpoint": "/fetch/{type}",
            "types": ["text", "html"],
            "required_params": ["url"],
            "optional_params": ["css_path", "click_css_path"],
            "examples": [
                "/fetch/text?url=https://example.com",
                "/fetch/html?url=https://example.com&css_path=.content",
                "/fetch/text?url=https://example.com&click_css_path=.load-more&css_path=.result",
            ],
        },
        "login": {
            "modules": state.modules.list(),
            "create_session": "POST /modules/{module}/sessions",
            "qrcode": "GET /modules/{module}/sessions/{id}/qrcode",
            "image": "GET /modules/{module}/sessions/{id}/image[?format=base64]",
            "check": "GET /modules/{module}/sessions/{id}/check",
            "delete": "DELETE /modules/{module}/sessions/{id}",
        },
        "config": {
            "port": state.config.server.port,
            "headless": state.config.browser.headless,
            "debug": state.config.server.debug,
        },
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(usage))
        .route("/health", get(health_check))
        .route("/fetch/:kind", get(fetch::fetch_content))
        .route("/modules", get(login::list_modules))
        .route("/modules/:module/sessions", post(login::create_session))
        .route("/modules/:module/sessions/:id", delete(login::delete_session))
        .route("/modules/:module/sessions/:id/qrcode", get(login::get_qr_code))
        .route("/modules/:module/sessions/:id/image", get(login::get_qr_image))
        .route("/modules/:module/sessions/:id/check", get(login::check_login))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.server.port;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on http://localhost:{}", port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FetchConfig, SessionConfig};
    use crate::modules::{BaiduModule, SettleDelays};
    use crate::testing::{MockBrowser, MockElement, MockPageSpec};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const LOGIN_URL: &str = "https://passport.baidu.com/v2/?login";
    const QR_SELECTOR: &str = "#TANGRAM__PSP_3__QrcodeMain > img";

    fn state(browser: &MockBrowser) -> AppState {
        let mut modules = ModuleRegistry::new();
        modules.register(BaiduModule::with_delays(SettleDelays::none()));

        AppState::new(
            Arc::new(SessionManager::new(
                Arc::new(browser.clone()),
                SessionConfig::default(),
            )),
            Arc::new(modules),
            Arc::new(ContentFetcher::new(
                Arc::new(browser.driver()),
                FetchConfig::immediate(),
            )),
            Config::default(),
        )
    }

    fn browser() -> MockBrowser {
        MockBrowser::new()
            .with_page(
                LOGIN_URL,
                MockPageSpec::new()
                    .element(
                        QR_SELECTOR,
                        MockElement::new().attr("src", "/qr?sign=1").image(b"png"),
                    )
                    .cookie("BDUSS", "token"),
            )
            .with_page(
                "https://example.com/",
                MockPageSpec::new().element("body", MockElement::new().text("hello")),
            )
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn call_json(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let (status, body) = call(app, method, uri).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state(&browser()));
        let (status, body) = call_json(&app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["browser"], "connected");
    }

    #[tokio::test]
    async fn test_health_reports_lost_connection() {
        let browser = browser();
        let app = router(state(&browser));
        browser.disconnect(true);

        let (status, body) = call_json(&app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["browser"], "disconnected");
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let app = router(state(&browser()));
        let (status, body) =
            call_json(&app, "GET", "/fetch/text?url=https://example.com/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "hello");
        assert_eq!(body["type"], "text");
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_kind_and_missing_url() {
        let app = router(state(&browser()));
        let (status, _) = call_json(&app, "GET", "/fetch/json?url=https://example.com/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call_json(&app, "GET", "/fetch/text").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_login_flow_over_http() {
        let browser = browser();
        let app = router(state(&browser));

        let (status, body) = call_json(&app, "POST", "/modules/baidu/sessions").await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) =
            call_json(&app, "GET", &format!("/modules/baidu/sessions/{}/check", id)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "SESSION_NOT_READY");

        let (status, body) =
            call_json(&app, "GET", &format!("/modules/baidu/sessions/{}/qrcode", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["qrcode_url"], "https://passport.baidu.com/qr?sign=1");

        let (status, bytes) =
            call(&app, "GET", &format!("/modules/baidu/sessions/{}/image", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"png".to_vec());

        let (status, body) =
            call_json(&app, "GET", &format!("/modules/baidu/sessions/{}/check", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logged_in"], false);
        assert!(body.get("cookies").is_none());

        browser
            .last_page()
            .unwrap()
            .insert_element(".user-name", MockElement::new());
        let (status, body) =
            call_json(&app, "GET", &format!("/modules/baidu/sessions/{}/check", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logged_in"], true);
        assert_eq!(body["cookies"]["BDUSS"], "token");

        // torn down after the successful poll
        let (status, _) =
            call_json(&app, "GET", &format!("/modules/baidu/sessions/{}/check", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(browser.driver_close_counts()[1], 1);
    }

    #[tokio::test]
    async fn test_image_as_base64() {
        let app = router(state(&browser()));
        let (_, body) = call_json(&app, "POST", "/modules/baidu/sessions").await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call_json(
            &app,
            "GET",
            &format!("/modules/baidu/sessions/{}/image?format=base64", id),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "cG5n");
        assert_eq!(body["mime_type"], "image/png");
    }

    #[tokio::test]
    async fn test_unknown_module_and_session() {
        let app = router(state(&browser()));

        let (status, _) = call_json(&app, "POST", "/modules/weibo/sessions").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call_json(&app, "GET", "/modules/baidu/sessions/unknown-id/qrcode").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call_json(&app, "DELETE", "/modules/baidu/sessions/unknown-id").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let browser = browser();
        let app = router(state(&browser));
        let (_, body) = call_json(&app, "POST", "/modules/baidu/sessions").await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let (status, _) = call_json(&app, "DELETE", &format!("/modules/baidu/sessions/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call_json(&app, "DELETE", &format!("/modules/baidu/sessions/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(browser.driver_close_counts()[1], 1);
    }

    #[tokio::test]
    async fn test_modules_listing() {
        let app = router(state(&browser()));
        let (status, body) = call_json(&app, "GET", "/modules").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["modules"], json!(["baidu"]));
    }
}
