//! The seam between the pipeline and whatever renders it.
//!
//! The pipeline never draws anything itself. It tells a [`Presenter`] when to
//! show a notification, when the loading indicator becomes visible or hidden,
//! and when the user has to log in again.

use crate::protocol::NotificationStyle;
use parking_lot::Mutex;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Operation succeeded
    Success,
    /// Something needs attention but nothing failed
    Warning,
    /// Operation failed
    Error,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Whether the message auto-dismisses
    pub style: NotificationStyle,
    /// Text
    pub message: String,
}

impl Notification {
    /// Transient success message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            style: NotificationStyle::Transient,
            message: message.into(),
        }
    }

    /// Transient warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            style: NotificationStyle::Transient,
            message: message.into(),
        }
    }

    /// Error message with the given style.
    pub fn error(message: impl Into<String>, style: NotificationStyle) -> Self {
        Self {
            level: NotificationLevel::Error,
            style,
            message: message.into(),
        }
    }

    /// Whether the notification stays until dismissed.
    pub fn is_persistent(&self) -> bool {
        self.style == NotificationStyle::Persistent
    }
}

/// Receiver of the pipeline's user-facing side effects.
pub trait Presenter: Send + Sync {
    /// Show a notification.
    fn notify(&self, notification: Notification);

    /// The loading indicator changed visibility.
    ///
    /// Called with `true` when the first loading request starts and `false`
    /// when the last one settles. `text` is the text of the request that made
    /// the indicator visible.
    fn loading_changed(&self, visible: bool, text: Option<&str>);

    /// Credentials are gone; send the user to the login entry point.
    fn redirect_to_login(&self, path: &str);
}

/// Presenter that only logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(text = %notification.message, "notification"),
            NotificationLevel::Warning => tracing::warn!(text = %notification.message, "notification"),
            NotificationLevel::Error => tracing::error!(
                text = %notification.message,
                persistent = notification.is_persistent(),
                "notification"
            ),
        }
    }

    fn loading_changed(&self, visible: bool, text: Option<&str>) {
        tracing::debug!(visible, text, "loading indicator");
    }

    fn redirect_to_login(&self, path: &str) {
        tracing::warn!(path, "session lost, redirecting to login");
    }
}

/// Something the [`RecordingPresenter`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    /// [`Presenter::notify`]
    Notified(Notification),
    /// [`Presenter::loading_changed`]
    Loading {
        /// New visibility
        visible: bool,
        /// Indicator text
        text: Option<String>,
    },
    /// [`Presenter::redirect_to_login`]
    Redirected(String),
}

/// Presenter that records every event, for headless use and tests.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().clone()
    }

    /// Recorded notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::Notified(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded login redirects.
    pub fn redirects(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::Redirected(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&self, notification: Notification) {
        self.events.lock().push(PresenterEvent::Notified(notification));
    }

    fn loading_changed(&self, visible: bool, text: Option<&str>) {
        self.events.lock().push(PresenterEvent::Loading {
            visible,
            text: text.map(str::to_string),
        });
    }

    fn redirect_to_login(&self, path: &str) {
        self.events
            .lock()
            .push(PresenterEvent::Redirected(path.to_string()));
    }
}
