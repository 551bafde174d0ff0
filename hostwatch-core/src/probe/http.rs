//! HTTP endpoint probe.
//!
//! The endpoint is healthy when a POST of a trivial JSON payload returns a
//! 2xx status and a JSON object carrying the [`REQUIRED_FIELD`].

use std::time::Duration;
use tracing::warn;

/// Field the endpoint's JSON response must contain.
pub const REQUIRED_FIELD: &str = "hash";

fn probe_payload() -> serde_json::Value {
    serde_json::json!({ "name": "test" })
}

/// Returns `true` iff the endpoint answers 2xx with a JSON object holding [`REQUIRED_FIELD`].
pub async fn check_endpoint(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let response = match client
        .post(url)
        .json(&probe_payload())
        .timeout(timeout)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            warn!(url, timeout_ms = timeout.as_millis() as u64, "API endpoint timed out");
            return false;
        }
        Err(e) => {
            warn!(url, error = %e, "Error checking API endpoint");
            return false;
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "API endpoint responded with error status");
        return false;
    }

    let body: serde_json::Value = match response.json().await {
        Ok(v) => v,
        Err(e) => {
            warn!(url, error = %e, "API endpoint responded with non-JSON content");
            return false;
        }
    };

    match body.as_object() {
        Some(obj) if obj.contains_key(REQUIRED_FIELD) => true,
        _ => {
            warn!(url, field = REQUIRED_FIELD, "API endpoint responded without required field");
            false
        }
    }
}
