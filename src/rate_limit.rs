//! Flood-control hints from Bot API responses.
//!
//! Telegram puts the backoff into the JSON body (`parameters.retry_after`).
//! Proxies in front of the API sometimes only send a `Retry-After` header, so
//! the header is used as a fallback.

use http::HeaderMap;
use serde::Deserialize;
use std::time::{Duration, SystemTime};

/// The `parameters` object of a failed Bot API response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ResponseParameters {
    /// New identifier of a group upgraded to a supergroup.
    #[serde(default)]
    pub migrate_to_chat_id: Option<i64>,

    /// Seconds to wait before repeating the request.
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl ResponseParameters {
    /// Returns the requested backoff, preferring the body over the header.
    pub fn retry_after(&self, headers: &HeaderMap) -> Option<Duration> {
        self.retry_after
            .map(Duration::from_secs)
            .or_else(|| parse_retry_after(headers))
    }
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date_time) = httpdate::parse_http_date(header) {
        if let Ok(duration) = date_time.duration_since(SystemTime::now()) {
            return Some(duration);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));

        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_retry_after_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));

        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_body_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));
        let params: ResponseParameters =
            serde_json::from_str(r#"{"retry_after": 3}"#).unwrap();

        assert_eq!(params.retry_after(&headers), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));

        let params = ResponseParameters::default();
        assert_eq!(params.retry_after(&headers), Some(Duration::from_secs(7)));
        assert_eq!(params.retry_after(&HeaderMap::new()), None);
    }
}
