//! Shared HTTP client and header helpers for model endpoints.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::warn;

use crate::error::HostError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// Per-call deadlines come from the orchestration loop, so only the connect
/// phase is bounded here.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Turn a non-success HTTP status into a model call error, preferring the
/// provider's own error message when the body carries one.
pub fn status_to_error(status: u16, body: &str) -> HostError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    HostError::model_status(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_error_extracts_provider_message() {
        let err = status_to_error(
            429,
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert!(matches!(
            err,
            HostError::ModelCall { status: Some(429), ref message } if message == "slow down"
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn status_to_error_keeps_raw_body() {
        let err = status_to_error(500, "upstream exploded");
        assert_eq!(err.to_string(), "Model call failed (status 500): upstream exploded");
    }

    #[test]
    fn anthropic_headers_set_key_and_version() {
        let headers = anthropic_headers("sk-test", "2023-06-01");
        assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
    }
}
