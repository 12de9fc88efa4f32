use super::{Middleware, Next};
use crate::error::Result;
use crate::state::HttpContext;
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

/// Counts requests with `show_loading` towards the shared loading indicator.
///
/// Sits outside retry and refresh, so a request is counted once no matter how
/// many attempts it takes.
pub struct LoadingTracker {
    context: Arc<HttpContext>,
}

impl LoadingTracker {
    /// Tracker driving the context's loading counter.
    pub fn new(context: Arc<HttpContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Middleware for LoadingTracker {
    fn name(&self) -> &'static str {
        "loading"
    }

    async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        if !request.options.show_loading {
            return next.run(request).await;
        }

        let _guard = self
            .context
            .begin_loading(request.options.loading_text.as_deref());
        next.run(request).await
    }
}
