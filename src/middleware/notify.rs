use super::{Middleware, Next};
use crate::error::{ApiError, ClientErrorKind, Result};
use crate::protocol::{notification_style, NotificationStyle};
use crate::state::{HttpContext, Notification};
use crate::types::{RawResponse, RequestDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

const NETWORK_MESSAGE: &str = "Network error, please check your connection";
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired, please log in again";

/// Surfaces the outcome of each call through the presenter.
///
/// On success, shows the request's `success_message` if it has one. On
/// failure, shows the notifications from [`notifications_for`] unless the
/// request set `skip_error_handler`.
pub struct ErrorNotifier {
    context: Arc<HttpContext>,
}

impl ErrorNotifier {
    /// Notifier reporting to the context's presenter.
    pub fn new(context: Arc<HttpContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Middleware for ErrorNotifier {
    fn name(&self) -> &'static str {
        "error-notifier"
    }

    async fn handle(&self, request: RequestDescriptor, next: Next<'_>) -> Result<RawResponse> {
        let skip = request.options.skip_error_handler;
        let success_message = request.options.success_message.clone();

        let outcome = next.run(request).await;
        let presenter = self.context.presenter();

        match &outcome {
            Ok(_) => {
                if let Some(message) = success_message {
                    presenter.notify(Notification::success(message));
                }
            }
            Err(err) if !skip => {
                for notification in notifications_for(err) {
                    presenter.notify(notification);
                }
            }
            Err(_) => {}
        }

        outcome
    }
}

/// Notifications shown for a failed call.
///
/// Exactly one, except for a 422 carrying field errors, which yields one per
/// field. Server errors are persistent, everything else auto-dismisses.
pub fn notifications_for(err: &ApiError) -> Vec<Notification> {
    match err {
        ApiError::Network(_) => vec![Notification::error(
            NETWORK_MESSAGE,
            NotificationStyle::Transient,
        )],
        ApiError::Client {
            kind: ClientErrorKind::Validation,
            body,
            ..
        } if !body.field_errors().is_empty() => body
            .field_errors()
            .iter()
            .map(|e| {
                Notification::error(format!("{}: {}", e.field, e.message), NotificationStyle::Transient)
            })
            .collect(),
        ApiError::Client { status, body, .. } | ApiError::Server { status, body } => {
            vec![Notification::error(body.message.clone(), notification_style(*status))]
        }
        ApiError::Rejected { body, .. } => vec![Notification::error(
            body.message.clone(),
            NotificationStyle::Transient,
        )],
        ApiError::RefreshFailure(_) => vec![Notification::warning(SESSION_EXPIRED_MESSAGE)],
        ApiError::Decode(_) | ApiError::Storage(_) | ApiError::Io(_) | ApiError::InvalidRequest(_) => {
            vec![Notification::error(err.to_string(), NotificationStyle::Transient)]
        }
    }
}
