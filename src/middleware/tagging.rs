use super::{Middleware, Next};
use crate::client::generate_request_id;
use crate::error::Result;
use crate::protocol::headers::{API_VERSION, X_REQUEST_ID};
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use http::HeaderValue;
use std::time::Instant;

/// Tags every attempt with `X-Request-ID` and `API-Version`, and logs it.
pub struct RequestTagger {
    api_version: HeaderValue,
    enable_logging: bool,
}

impl RequestTagger {
    /// Tagger sending `api_version`.
    pub fn new(api_version: impl AsRef<str>, enable_logging: bool) -> Self {
        let api_version = HeaderValue::from_str(api_version.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("v1"));
        Self {
            api_version,
            enable_logging,
        }
    }
}

#[async_trait]
impl Middleware for RequestTagger {
    fn name(&self) -> &'static str {
        "request-tagger"
    }

    async fn handle(&self, mut request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            request.headers.insert(X_REQUEST_ID, value);
        }
        request.headers.insert(API_VERSION, self.api_version.clone());

        if !self.enable_logging {
            return next.run(request).await;
        }

        let method = request.method.clone();
        let url = request.url.clone();
        let attempt = request.attempt();
        tracing::debug!(%request_id, %method, %url, attempt, "sending request");

        let started = Instant::now();
        let outcome = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(response) => tracing::debug!(
                %request_id,
                %method,
                %url,
                status = response.status,
                elapsed_ms,
                "request completed"
            ),
            Err(err) => tracing::debug!(
                %request_id,
                %method,
                %url,
                status = err.status(),
                elapsed_ms,
                error = %err,
                "request failed"
            ),
        }

        outcome
    }
}
