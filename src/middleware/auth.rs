use super::{Middleware, Next};
use crate::error::{ApiError, Result};
use crate::protocol::headers::bearer;
use crate::state::HttpContext;
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use http::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;

/// Adds `Authorization: Bearer <token>` from the current session.
///
/// Runs once per attempt, so a replay after a refresh carries the new token.
/// Requests with `skip_auth`, and requests made while logged out, go out
/// without the header.
pub struct AuthInjector {
    context: Arc<HttpContext>,
}

impl AuthInjector {
    /// Injector reading the context's session.
    pub fn new(context: Arc<HttpContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Middleware for AuthInjector {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, mut request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        if !request.options.skip_auth {
            if let Some(token) = self.context.access_token()? {
                let value = HeaderValue::from_str(&bearer(&token))
                    .map_err(|_| ApiError::Storage("access token is not a valid header value".into()))?;
                request.headers.insert(AUTHORIZATION, value);
            }
        }
        next.run(request).await
    }
}
