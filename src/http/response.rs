//! Response rendering.
//!
//! # Responsibilities
//! - Turn a [`ProxyResponse`] into an HTTP response
//! - Set content type, download disposition and cache metadata headers
//!
//! # Design Decisions
//! - `Access-Control-Allow-Origin` is added by a router layer so error
//!   responses carry it too
//! - Header values that cannot be represented are dropped, not fatal

use axum::{
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat};

use crate::cache;
use crate::http::pipeline::{CacheStatus, ProxyResponse};
use crate::routing::builder::encode_value;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_AGE: HeaderName = HeaderName::from_static("x-cache-age");
pub const X_CACHE_EXPIRES_IN: HeaderName = HeaderName::from_static("x-cache-expires-in");
pub const X_CACHE_EXPIRES_AT: HeaderName = HeaderName::from_static("x-cache-expires-at");

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();

        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        headers.insert(CONTENT_TYPE, content_type);

        if let Some(value) = self.filename.as_deref().and_then(content_disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }

        insert_cache_headers(&mut headers, &self.cache);

        (headers, self.body).into_response()
    }
}

/// Write `X-Cache*` and `Cache-Control` for `status`.
pub fn insert_cache_headers(headers: &mut HeaderMap, status: &CacheStatus) {
    headers.insert(X_CACHE, HeaderValue::from_static(status.label()));
    match status {
        CacheStatus::Hit {
            age,
            expires_in,
            expires_at_millis,
        } => {
            headers.insert(X_CACHE_AGE, HeaderValue::from(age.as_secs()));
            headers.insert(X_CACHE_EXPIRES_IN, HeaderValue::from(expires_in.as_secs()));
            insert_expires_at(headers, *expires_at_millis);
            insert_max_age(headers, expires_in.as_secs());
        }
        CacheStatus::Miss {
            ttl,
            stored_at_millis,
        } => {
            headers.insert(X_CACHE_AGE, HeaderValue::from(0u64));
            headers.insert(X_CACHE_EXPIRES_IN, HeaderValue::from(ttl.as_secs()));
            insert_expires_at(headers, cache::expires_at_millis(*stored_at_millis, *ttl));
            insert_max_age(headers, ttl.as_secs());
        }
        CacheStatus::Disabled => {}
    }
}

fn insert_expires_at(headers: &mut HeaderMap, millis: u64) {
    if let Some(value) = format_timestamp(millis).and_then(|s| HeaderValue::from_str(&s).ok()) {
        headers.insert(X_CACHE_EXPIRES_AT, value);
    }
}

fn insert_max_age(headers: &mut HeaderMap, secs: u64) {
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", secs)) {
        headers.insert(CACHE_CONTROL, value);
    }
}

/// RFC 3339 UTC timestamp for epoch milliseconds.
pub fn format_timestamp(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::from_timestamp_millis(millis).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// `attachment; filename="..."`, plus an RFC 5987 `filename*` for non-ASCII names.
pub fn content_disposition(filename: &str) -> Option<HeaderValue> {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = if cleaned.is_ascii() {
        format!("attachment; filename=\"{}\"", cleaned)
    } else {
        let fallback: String = cleaned
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            encode_value(&cleaned)
        )
    };
    HeaderValue::from_str(&value).ok()
}
