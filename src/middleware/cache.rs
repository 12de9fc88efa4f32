use super::{Middleware, Next};
use crate::error::Result;
use crate::protocol::headers::PRAGMA;
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use http::header::{HeaderValue, CACHE_CONTROL};

/// Translates the request's cache mode into headers.
///
/// `no-cache` also sends `Pragma: no-cache` for HTTP/1.0 intermediaries.
pub struct CacheControl;

#[async_trait]
impl Middleware for CacheControl {
    fn name(&self) -> &'static str {
        "cache-control"
    }

    async fn handle(&self, mut request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        if let Some(directive) = request.options.cache.header_value() {
            request
                .headers
                .insert(CACHE_CONTROL, HeaderValue::from_static(directive));
            if directive == "no-cache" {
                request
                    .headers
                    .insert(PRAGMA, HeaderValue::from_static("no-cache"));
            }
        }
        next.run(request).await
    }
}
