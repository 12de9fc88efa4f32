//! Token refresh on HTTP 401.
//!
//! ```text
//!  Authenticated ──401──▶ Refreshing ──ok──▶ Authenticated (replay once)
//!                              │
//!                              └──fail──▶ LoggedOut (session cleared, redirect)
//! ```
//!
//! The refresh call goes straight to the transport: it is not tagged, retried,
//! counted as loading or reported through notifications. Concurrent 401s share
//! one refresh through the context's [`RefreshGate`](crate::state::RefreshGate).

use super::{Middleware, Next};
use crate::client::{classify_response, decode_payload, ClientConfig, Transport};
use crate::error::{ApiError, Result};
use crate::state::{AuthSession, HttpContext};
use crate::types::{RawResponse, RequestDescriptor, RequestOptions};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshedTokens {
    #[serde(alias = "token", alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

/// Refreshes the session on 401 and replays the failed request once.
pub struct TokenRefresh {
    context: Arc<HttpContext>,
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl TokenRefresh {
    /// Refresh stage issuing its refresh call through `transport`.
    pub fn new(
        context: Arc<HttpContext>,
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            context,
            config,
            transport,
        }
    }

    async fn refresh(&self) -> Result<AuthSession> {
        let context = self.context.clone();
        let transport = self.transport.clone();
        let url = self.config.resolve_url(&self.config.refresh_path);
        let login_path = self.config.login_path.clone();

        self.context
            .refresh_gate()
            .run(move || refresh_session(context, transport, url, login_path).boxed())
            .await
    }
}

#[async_trait]
impl Middleware for TokenRefresh {
    fn name(&self) -> &'static str {
        "token-refresh"
    }

    async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        if request.options.skip_auth {
            return next.run(request).await;
        }

        let sent_token = self.context.access_token()?;
        match next.run(request.clone()).await {
            Err(err) if err.is_unauthorized() => {
                let current_token = self.context.access_token()?;
                if current_token.is_some() && current_token != sent_token {
                    tracing::debug!(url = %request.url, "token rotated while request was in flight, replaying");
                } else {
                    tracing::warn!(url = %request.url, "access token rejected, refreshing session");
                    self.refresh().await?;
                }
                next.run(request).await
            }
            outcome => outcome,
        }
    }
}

/// Perform one refresh; on failure the session is cleared and the presenter
/// redirects to the login entry point.
async fn refresh_session(
    context: Arc<HttpContext>,
    transport: Arc<dyn Transport>,
    url: String,
    login_path: String,
) -> Result<AuthSession> {
    match exchange_refresh_token(&context, transport.as_ref(), &url).await {
        Ok(session) => {
            tracing::info!("session refreshed");
            Ok(session)
        }
        Err(err) => {
            tracing::error!(error = %err, "session refresh failed, logging out");
            if let Err(clear_err) = context.session().clear() {
                tracing::warn!(error = %clear_err, "could not clear session");
            }
            context.presenter().redirect_to_login(&login_path);
            Err(ApiError::RefreshFailure(err.to_string()))
        }
    }
}

async fn exchange_refresh_token(
    context: &HttpContext,
    transport: &dyn Transport,
    url: &str,
) -> Result<AuthSession> {
    let refresh_token = context
        .session()
        .load()?
        .and_then(|session| session.refresh_token)
        .ok_or_else(|| ApiError::RefreshFailure("no refresh token stored".to_string()))?;

    let request = RequestDescriptor::post(url)
        .with_json(&RefreshRequest {
            refresh_token: &refresh_token,
        })?
        .with_options(RequestOptions::new().without_auth().without_error_handler());

    let raw = classify_response(&request, transport.send(&request).await?)?;
    let tokens: RefreshedTokens = decode_payload(&raw.body)?;

    let session = AuthSession::new(
        tokens.access_token,
        tokens.refresh_token.or(Some(refresh_token)),
    );
    context.session().save(&session)?;
    Ok(session)
}
