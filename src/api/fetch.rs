//! GET /fetch/{text|html}?url=&css_path=&click_css_path=

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::errors::{Result, SurfError};
use crate::types::{ContentKind, FetchRequest, FetchResult};

#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    pub url: Option<String>,
    pub css_path: Option<String>,
    pub click_css_path: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl FetchParams {
    fn into_request(self, kind: ContentKind) -> Result<FetchRequest> {
        let url = non_empty(self.url).ok_or_else(|| {
            SurfError::InvalidRequest("Missing required parameter: url".to_string())
        })?;

        Ok(FetchRequest {
            url,
            kind,
            css_path: non_empty(self.css_path),
            click_css_path: non_empty(self.click_css_path),
        })
    }
}

pub(super) async fn fetch_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<FetchParams>,
) -> Result<Json<FetchResult>> {
    let kind: ContentKind = kind.parse()?;
    let request = params.into_request(kind)?;
    let result = state.fetcher.fetch(&request).await?;
    Ok(Json(result))
}
