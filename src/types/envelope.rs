//! The response envelope wire contract.
//!
//! ```text
//! { "success": true,  "data": <T> }
//! { "success": false, "error": { "code": "...", "message": "...", "details": { "errors": [{ "field": "...", "message": "..." }] } } }
//! ```
//!
//! Exactly one of `data` / `error` is populated. A failure always carries a
//! non-empty message: empty messages are replaced with
//! [`DEFAULT_ERROR_MESSAGE`] when decoding and when constructing.

use crate::error::ApiError;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when a failure carries no usable message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

/// Optional error details.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Per-field validation errors (HTTP 422).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Any other detail keys, preserved as sent.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The `error` member of a failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code
    #[serde(default = "default_code")]
    pub code: String,
    /// Human-readable message, never empty
    #[serde(default = "default_message", deserialize_with = "non_empty_message")]
    pub message: String,
    /// Optional details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

fn default_code() -> String {
    "UNKNOWN_ERROR".to_string()
}

fn default_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}

fn non_empty_message<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let message = Option::<String>::deserialize(deserializer)?;
    Ok(match message {
        Some(m) if !m.trim().is_empty() => m,
        _ => default_message(),
    })
}

impl ErrorBody {
    /// Create an error body; an empty message is replaced with the default.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.into(),
            message: if message.trim().is_empty() {
                default_message()
            } else {
                message
            },
            details: None,
        }
    }

    /// Attach per-field validation errors.
    pub fn with_field_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.details.get_or_insert_with(ErrorDetails::default).errors = Some(errors);
        self
    }

    /// Per-field validation errors, empty when there are none.
    pub fn field_errors(&self) -> &[FieldError] {
        self.details
            .as_ref()
            .and_then(|d| d.errors.as_deref())
            .unwrap_or(&[])
    }

    /// Extract an error body from a response payload.
    ///
    /// Accepts a failure envelope, a bare `{"error": {...}}` object, or an
    /// object that is itself an error body (has `message` or `code`).
    pub fn from_response_bytes(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let candidate = value
            .get("error")
            .filter(|e| e.is_object())
            .unwrap_or(&value);
        if candidate.get("message").is_none() && candidate.get("code").is_none() {
            return None;
        }
        ErrorBody::deserialize(candidate).ok()
    }
}

/// Uniform result of an API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// `{ success: true, data }`
    Success(T),
    /// `{ success: false, error }`
    Failure(ErrorBody),
}

impl<T> Envelope<T> {
    /// Build an envelope from a pipeline result.
    pub fn from_result(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Envelope::Success(data),
            Err(err) => Envelope::Failure(err.to_error_body()),
        }
    }

    /// `success` flag.
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    /// Borrow the data of a success.
    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Success(data) => Some(data),
            Envelope::Failure(_) => None,
        }
    }

    /// Borrow the error of a failure.
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Envelope::Success(_) => None,
            Envelope::Failure(error) => Some(error),
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            Envelope::Success(data) => Ok(data),
            Envelope::Failure(error) => Err(error),
        }
    }

    /// Map the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        match self {
            Envelope::Success(data) => Envelope::Success(f(data)),
            Envelope::Failure(error) => Envelope::Failure(error),
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 2)?;
        match self {
            Envelope::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Envelope::Failure(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct WireEnvelope<T> {
    success: bool,
    // `None` only when the key is absent; `"data": null` decodes as `T`.
    #[serde(default, deserialize_with = "present")]
    data: Option<T>,
    error: Option<ErrorBody>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::<T>::deserialize(deserializer)?;
        match (wire.success, wire.data, wire.error) {
            (true, Some(data), _) => Ok(Envelope::Success(data)),
            (true, None, _) => Err(de::Error::custom("success envelope without `data`")),
            (false, _, Some(error)) => Ok(Envelope::Failure(error)),
            (false, _, None) => Err(de::Error::custom("failure envelope without `error`")),
        }
    }
}
