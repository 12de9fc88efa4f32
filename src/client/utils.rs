//! Utility functions for the studio HTTP client.
//!
//! This module provides helpers for:
//! - Status code classification and retry backoff
//! - Request id generation
//! - Response classification and payload decoding
//! - Turning serializable filter objects into query parameters

use crate::error::{ApiError, Result};
use crate::types::{Envelope, ErrorBody, RawResponse, RequestDescriptor, ResponseKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Check if status code indicates a retryable error
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Delay before retry number `attempt` (1-based).
///
/// `min(base_ms * 2^(attempt - 1), max_ms)`, no jitter.
pub fn retry_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay_ms = base_ms.saturating_mul(1_u64 << exponent).min(max_ms);
    Duration::from_millis(delay_ms)
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a request id of the form `req_<unix-millis>_<9 base36 chars>`.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let mut random = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(BASE36[(random % 36) as usize] as char);
        random /= 36;
    }

    format!("req_{millis}_{suffix}")
}

/// Turn a raw transport response into the pipeline's outcome.
///
/// Non-2xx statuses become [`ApiError::Client`] / [`ApiError::Server`], with
/// the server's error body when it sent one. A 2xx JSON response whose body is
/// a failure envelope becomes [`ApiError::Rejected`].
pub fn classify_response(request: &RequestDescriptor, raw: RawResponse) -> Result<RawResponse> {
    if !raw.is_success() {
        let body = ErrorBody::from_response_bytes(&raw.body);
        return Err(ApiError::from_status(raw.status, body));
    }

    if request.response_kind == ResponseKind::Json {
        if let Ok(Envelope::Failure(body)) = serde_json::from_slice::<Envelope<Value>>(&raw.body) {
            return Err(ApiError::Rejected {
                status: raw.status,
                body,
            });
        }
    }

    Ok(raw)
}

/// Decode a JSON payload that may or may not be wrapped in an envelope.
///
/// An empty body decodes as JSON `null`, so `()` and `Option<_>` targets work
/// for `204 No Content`.
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }

    let value: Value = serde_json::from_slice(body)?;
    if value.get("success").is_some_and(Value::is_boolean) {
        match serde_json::from_value::<Envelope<T>>(value.clone()) {
            Ok(Envelope::Success(data)) => return Ok(data),
            Ok(Envelope::Failure(error)) => {
                return Err(ApiError::Rejected {
                    status: 200,
                    body: error,
                })
            }
            Err(_) => {}
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Flatten a serializable object into query parameters.
///
/// Nulls and empty strings are dropped, scalars are stringified, arrays
/// become repeated keys and nested objects are JSON-encoded.
pub fn to_query_pairs<S: Serialize + ?Sized>(params: &S) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(params)
        .map_err(|e| ApiError::InvalidRequest(format!("query is not serializable: {e}")))?;

    let object = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(object) => object,
        other => {
            return Err(ApiError::InvalidRequest(format!(
                "query must be an object, got {other}"
            )))
        }
    };

    let mut pairs = Vec::with_capacity(object.len());
    for (key, value) in object {
        match value {
            Value::Array(items) => {
                pairs.extend(items.iter().filter_map(scalar_to_string).map(|v| (key.clone(), v)));
            }
            other => {
                if let Some(v) = scalar_to_string(&other) {
                    pairs.push((key, v));
                }
            }
        }
    }
    Ok(pairs)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
