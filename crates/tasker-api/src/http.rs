//! Plumbing shared by both clients: URL building and response checks.

use crate::error::ApiError;
use crate::Result;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

pub(crate) const USER_AGENT: &str = concat!("tasker/", env!("CARGO_PKG_VERSION"));

/// Parse a configured base address, dropping any trailing slash.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ApiError::BaseAddress {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ApiError::BaseAddress {
            url: raw.to_string(),
            reason: "not a hierarchical URL".into(),
        });
    }
    Ok(url)
}

/// `base` with `segments` appended, each percent-encoded as one segment.
pub(crate) fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Fail on non-success statuses, keeping the response text as the message.
pub(crate) async fn check(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(service, status = status.as_u16(), "request rejected");
    Err(ApiError::Status {
        service,
        status: status.as_u16(),
        body: error_message(&body).unwrap_or(body),
    })
}

pub(crate) async fn json<T: DeserializeOwned>(service: &'static str, response: Response) -> Result<T> {
    let response = check(service, response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| ApiError::Payload { service, source })
}

// Both services wrap failures as JSON with a `message` field.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}
