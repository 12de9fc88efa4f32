use super::{Middleware, Next};
use crate::client::retry_backoff;
use crate::error::Result;
use crate::state::HttpContext;
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::sleep;

/// Re-attempts requests that fail with a retryable status or no response.
///
/// Up to `retry_count` retries per request, tracked in the context's retry
/// ledger under a ticket taken once per call. Retry `k` waits
/// `min(base * 2^(k-1), max)` before re-issuing the request. Requests with
/// `retry_count == 0` pass straight through.
pub struct RetryPolicy {
    context: Arc<HttpContext>,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy with the given delay bounds, in milliseconds.
    pub fn new(context: Arc<HttpContext>, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            context,
            base_delay_ms,
            max_delay_ms,
        }
    }
}

#[async_trait]
impl Middleware for RetryPolicy {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        let ceiling = request.options.retry_count;
        if ceiling == 0 {
            return next.run(request).await;
        }

        let ledger = self.context.retries();
        let key = ledger.ticket(&request.identity());
        let mut request = request;

        loop {
            match next.run(request.clone()).await {
                Ok(response) => {
                    ledger.clear(&key);
                    return Ok(response);
                }
                Err(err) if err.is_retryable() => match ledger.begin_retry(&key, ceiling) {
                    Some(retry) => {
                        let delay = retry_backoff(retry, self.base_delay_ms, self.max_delay_ms);
                        tracing::warn!(
                            request = %key,
                            retry,
                            ceiling,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying request"
                        );
                        sleep(delay).await;
                        request = request.next_attempt();
                    }
                    None => {
                        tracing::warn!(request = %key, ceiling, error = %err, "retries exhausted");
                        return Err(err);
                    }
                },
                Err(err) => {
                    ledger.clear(&key);
                    return Err(err);
                }
            }
        }
    }
}
