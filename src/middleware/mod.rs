//! Request/response middleware.
//!
//! The pipeline is an ordered list of named [`Middleware`] stages over a
//! `(request, next)` signature. Each stage may inspect or rewrite its copy of
//! the request, call `next.run(request)` zero or more times, and inspect or
//! replace the outcome. When the list is exhausted the [`Transport`] performs
//! the exchange and the raw response is classified into success or
//! [`ApiError`](crate::ApiError).
//!
//! # Standard chain
//!
//! ```text
//!  caller
//!    │
//!    ▼
//!  error-notifier   notifications, once per call
//!  loading          loading counter, once per call
//!  token-refresh    401 → single refresh → one replay
//!  retry            retryable failures, capped backoff
//!  ───────────────  everything below runs once per attempt
//!  request-tagger   X-Request-ID, API-Version, attempt logs
//!  auth             Authorization: Bearer <token>
//!  cache-control    Cache-Control / Pragma
//!    │
//!    ▼
//!  transport
//! ```
//!
//! Extra middleware supplied by the embedder runs after `cache-control`,
//! immediately before the transport.

mod auth;
mod cache;
mod loading;
mod notify;
mod refresh;
mod retry;
mod tagging;

pub use auth::AuthInjector;
pub use cache::CacheControl;
pub use loading::LoadingTracker;
pub use notify::{notifications_for, ErrorNotifier};
pub use refresh::TokenRefresh;
pub use retry::RetryPolicy;
pub use tagging::RequestTagger;

use crate::client::{classify_response, ClientConfig, Transport};
use crate::error::Result;
use crate::state::HttpContext;
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

/// One stage of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stable name, used in logs and for introspection.
    fn name(&self) -> &'static str;

    /// Process `request`, delegating to the rest of the chain through `next`.
    async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse>;
}

/// The remainder of the chain after the current stage.
///
/// `Next` is `Copy`, so a stage can run the remainder more than once (retry,
/// replay after refresh).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn Transport,
    remaining: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Start of a chain.
    pub fn new(transport: &'a dyn Transport, middleware: &'a [Arc<dyn Middleware>]) -> Self {
        Self {
            transport,
            remaining: middleware,
        }
    }

    /// Run the rest of the chain.
    pub async fn run(self, request: RequestDescriptor) -> Result<RawResponse> {
        match self.remaining.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    transport: self.transport,
                    remaining: rest,
                };
                current.handle(request, next).await
            }
            None => {
                let raw = self.transport.send(&request).await?;
                classify_response(&request, raw)
            }
        }
    }
}

/// Ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Empty chain: requests go straight to the transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain, outermost stage first.
    pub fn standard(
        context: Arc<HttpContext>,
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new()
            .with(ErrorNotifier::new(context.clone()))
            .with(LoadingTracker::new(context.clone()))
            .with(TokenRefresh::new(context.clone(), config.clone(), transport))
            .with(RetryPolicy::new(
                context.clone(),
                config.retry_delay_ms,
                config.max_retry_delay_ms,
            ))
            .with(RequestTagger::new(
                config.api_version.clone(),
                config.enable_logging,
            ))
            .with(AuthInjector::new(context))
            .with(CacheControl)
    }

    /// Append a stage; it runs inside every stage already present.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Append an already shared stage.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `request` through every stage and the transport.
    pub async fn run(&self, transport: &dyn Transport, request: RequestDescriptor) -> Result<RawResponse> {
        Next::new(transport, &self.stages).run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use crate::error::ApiError;
    use http::{HeaderName, HeaderValue};
    use parking_lot::Mutex;

    struct EchoTransport {
        seen: Mutex<Vec<RequestDescriptor>>,
        status: u16,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse> {
            self.seen.lock().push(request.clone());
            Ok(RawResponse::new(self.status, "{}"))
        }

        async fn open_stream(&self, _request: &RequestDescriptor) -> Result<ByteStream> {
            Err(ApiError::InvalidRequest("not streaming".into()))
        }
    }

    struct Stamp(&'static str);

    #[async_trait]
    impl Middleware for Stamp {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
            let order = request
                .headers
                .get("x-order")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let stamped = format!("{order}{}", self.0);
            let request = request.with_header(
                HeaderName::from_static("x-order"),
                HeaderValue::from_str(&stamped).unwrap(),
            );
            next.run(request).await
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let transport = EchoTransport {
            seen: Mutex::new(Vec::new()),
            status: 200,
        };
        let chain = MiddlewareChain::new().with(Stamp("a")).with(Stamp("b"));
        assert_eq!(chain.names(), vec!["a", "b"]);

        chain.run(&transport, RequestDescriptor::get("http://x/")).await.unwrap();
        let seen = transport.seen.lock();
        assert_eq!(seen[0].headers["x-order"], "ab");
    }

    #[tokio::test]
    async fn test_empty_chain_classifies() {
        let transport = EchoTransport {
            seen: Mutex::new(Vec::new()),
            status: 404,
        };
        let err = MiddlewareChain::new()
            .run(&transport, RequestDescriptor::get("http://x/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_standard_chain_order() {
        let context = Arc::new(HttpContext::new());
        let config = Arc::new(ClientConfig::default());
        let transport: Arc<dyn Transport> = Arc::new(EchoTransport {
            seen: Mutex::new(Vec::new()),
            status: 200,
        });
        let chain = MiddlewareChain::standard(context, config, transport);
        assert_eq!(
            chain.names(),
            vec![
                "error-notifier",
                "loading",
                "token-refresh",
                "retry",
                "request-tagger",
                "auth",
                "cache-control"
            ]
        );
    }
}
