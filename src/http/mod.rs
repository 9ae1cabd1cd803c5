use crate::config::Config;
use crate::ratelimit::RateLimitSnapshot;
use crate::types::RateLimitResponse;
use log::{debug, warn};
use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, DATE, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode rate limit body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("GitHub returned {status} ({}): {}", .info.code, .info.message)]
    Status {
        status: StatusCode,
        info: ErrorInfo,
        rate: Option<RateLimitSnapshot>,
    },
}

/// Snapshots decoded from one `GET /rate_limit` exchange.
#[derive(Debug, Clone)]
pub struct RateLimitOverview {
    pub resources: BTreeMap<String, RateLimitSnapshot>,
    pub rate: Option<RateLimitSnapshot>,
    /// Counters carried on the response headers themselves, if any.
    pub headers: Option<RateLimitSnapshot>,
}

impl RateLimitOverview {
    /// Look up a resource bucket; `core` falls back to the legacy top-level `rate`.
    pub fn resource(&self, name: &str) -> Option<&RateLimitSnapshot> {
        self.resources.get(name).or(match name {
            "core" => self.rate.as_ref(),
            _ => None,
        })
    }
}

pub fn build_client(cfg: &Config) -> Result<Client, FetchError> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)?);
    let builder = Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls();
    Ok(builder.build()?)
}

fn auth_header(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token))
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ErrorInfo {
    let (code, retriable) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::CONFLICT => ("conflict", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    };
    ErrorInfo {
        code: code.to_string(),
        message,
        retriable,
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<T>().ok())
}

/// Build a snapshot from a REST response's `x-ratelimit-*` headers, using the
/// `Date` header for skew correction. All three counters must be present.
pub fn snapshot_from_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let limit = header_number::<i32>(headers, HEADER_LIMIT)?;
    let remaining = header_number::<i32>(headers, HEADER_REMAINING)?;
    let reset = header_number::<i64>(headers, HEADER_RESET)?;
    let date = headers.get(DATE).and_then(|v| v.to_str().ok());
    Some(RateLimitSnapshot::new(limit, remaining, reset, date))
}

pub async fn fetch_rate_limit(
    client: &Client,
    cfg: &Config,
) -> Result<RateLimitOverview, FetchError> {
    let url = format!("{}/rate_limit", cfg.api_url);
    let mut req = client
        .get(&url)
        .header("X-GitHub-Api-Version", &cfg.api_version)
        .header(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
    if let Some(token) = &cfg.token {
        req = req.header(AUTHORIZATION, auth_header(token)?);
    }

    let res = req.send().await?;
    let status = res.status();
    let headers = res.headers().clone();
    let header_snapshot = snapshot_from_headers(&headers);

    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        let mut info = map_status_to_error(status, text);
        // GitHub signals an exhausted primary quota as 403 with zero remaining.
        if status == StatusCode::FORBIDDEN && header_snapshot.is_some_and(|s| s.remaining() == 0) {
            info.code = "rate_limited".into();
            info.retriable = true;
        }
        warn!("GET {} failed with status {} ({})", url, status, info.code);
        return Err(FetchError::Status {
            status,
            info,
            rate: header_snapshot,
        });
    }

    let body: RateLimitResponse = res.json().await.map_err(FetchError::Decode)?;
    let date = headers.get(DATE).and_then(|v| v.to_str().ok());
    if date.is_none() {
        debug!("GET {} returned no Date header; reset times use local clock", url);
    }
    let resources = body
        .resources
        .into_iter()
        .map(|(name, record)| (name, record.into_snapshot(date)))
        .collect();
    Ok(RateLimitOverview {
        resources,
        rate: body.rate.map(|r| r.into_snapshot(date)),
        headers: header_snapshot,
    })
}
