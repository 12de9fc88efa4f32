//! Wire-level constants shared by the client and the middleware.
//!
//! - [`headers`] - header names and header value helpers
//! - [`status_message`] - fixed status → user message table
//! - [`NotificationStyle`] - how a failed status is surfaced

pub mod headers;

/// How a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStyle {
    /// Auto-dismissing toast
    Transient,
    /// Stays until dismissed
    Persistent,
}

/// User-facing message for an HTTP error status.
///
/// # Examples
///
/// ```
/// use studio_http::protocol::status_message;
///
/// assert_eq!(status_message(404), "The requested resource was not found");
/// assert_eq!(status_message(599), "Server error, please try again later");
/// ```
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized, please log in again",
        403 => "Access denied",
        404 => "The requested resource was not found",
        405 => "Method not allowed",
        408 => "Request timed out",
        409 => "Conflict with the current state of the resource",
        413 => "Payload too large",
        422 => "Validation failed",
        429 => "Too many requests, please try again later",
        500 => "Internal server error",
        501 => "Not implemented",
        502 => "Bad gateway",
        503 => "Service unavailable",
        504 => "Gateway timeout",
        400..=499 => "Request failed",
        500..=599 => "Server error, please try again later",
        _ => "Unexpected response",
    }
}

/// Notification style for an HTTP error status: persistent for 5xx.
pub fn notification_style(status: u16) -> NotificationStyle {
    if status >= 500 {
        NotificationStyle::Persistent
    } else {
        NotificationStyle::Transient
    }
}
