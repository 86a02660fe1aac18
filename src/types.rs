use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::SurfError;

/// Cookie as read from the current page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieData {
    pub name: String,
    pub value: String,
}

/// Outcome of a single login poll.
///
/// Failure is reported through [`SurfError::LoginFailed`], so a logged-in
/// status always carries its cookie map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    Pending,
    LoggedIn(HashMap<String, String>),
}

impl LoginStatus {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, LoginStatus::LoggedIn(_))
    }

    pub fn from_cookies(cookies: Vec<CookieData>) -> Self {
        LoginStatus::LoggedIn(
            cookies
                .into_iter()
                .map(|cookie| (cookie.name, cookie.value))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Html,
}

impl FromStr for ContentKind {
    type Err = SurfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "html" => Ok(ContentKind::Html),
            other => Err(SurfError::InvalidRequest(format!(
                "Invalid return type '{}'. Use 'text' or 'html'",
                other
            ))),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Text => f.write_str("text"),
            ContentKind::Html => f.write_str("html"),
        }
    }
}

/// A one-shot content extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub kind: ContentKind,
    pub css_path: Option<String>,
    pub click_css_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
    pub css_path: String,
    pub click_css_path: String,
}
