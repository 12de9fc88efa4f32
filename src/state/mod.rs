//! Shared pipeline state.
//!
//! Everything the middleware mutates across requests lives in an explicit
//! [`HttpContext`] handed to the client at construction time: the session
//! store, the loading counter, the retry ledger, the refresh gate and the
//! presenter. Two clients built on separate contexts share nothing, which keeps
//! tests isolated; clients cloned from one another share their context.
//!
//! ```text
//! state/
//! ├── loading      - LoadingCounter (reference-counted indicator)
//! ├── ledger       - RetryLedger (attempt counts per call)
//! ├── presenter    - Presenter trait, notifications
//! ├── refresh_gate - RefreshGate (single-flight refresh)
//! └── session      - AuthSession, SessionStore implementations
//! ```

mod ledger;
mod loading;
mod presenter;
mod refresh_gate;
mod session;

pub use ledger::RetryLedger;
pub use loading::{LoadingCounter, LoadingGuard};
pub use presenter::{
    Notification, NotificationLevel, Presenter, PresenterEvent, RecordingPresenter,
    TracingPresenter,
};
pub use refresh_gate::RefreshGate;
pub use session::{
    decode_session, encode_session, AuthSession, FileSessionStore, MemorySessionStore,
    SessionStore,
};

use crate::error::Result;
use std::sync::Arc;

/// State shared by every request issued through one client.
pub struct HttpContext {
    session: Arc<dyn SessionStore>,
    presenter: Arc<dyn Presenter>,
    loading: LoadingCounter,
    retries: RetryLedger,
    refresh: RefreshGate,
}

impl HttpContext {
    /// In-memory session and a tracing-only presenter.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(MemorySessionStore::new()), Arc::new(TracingPresenter))
    }

    /// Context over the given session store and presenter.
    pub fn with_parts(session: Arc<dyn SessionStore>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            session,
            presenter,
            loading: LoadingCounter::new(),
            retries: RetryLedger::new(),
            refresh: RefreshGate::new(),
        }
    }

    /// Replace the session store.
    pub fn with_session_store(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = session;
        self
    }

    /// Replace the presenter.
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Session store.
    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// Current access token, if a session exists.
    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.session.load()?.map(|s| s.token))
    }

    /// Presenter.
    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    /// Loading counter.
    pub fn loading(&self) -> &LoadingCounter {
        &self.loading
    }

    /// Retry ledger.
    pub fn retries(&self) -> &RetryLedger {
        &self.retries
    }

    /// Refresh gate.
    pub fn refresh_gate(&self) -> &RefreshGate {
        &self.refresh
    }

    /// Count a loading request until the returned guard drops.
    pub fn begin_loading(&self, text: Option<&str>) -> LoadingGuard<'_> {
        self.loading.begin(self.presenter.as_ref(), text)
    }
}

impl Default for HttpContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_isolated() {
        let a = HttpContext::new();
        let b = HttpContext::new();

        a.session().save(&AuthSession::new("a", None)).unwrap();
        let _guard = a.begin_loading(None);

        assert_eq!(a.access_token().unwrap().as_deref(), Some("a"));
        assert_eq!(b.access_token().unwrap(), None);
        assert_eq!(a.loading().count(), 1);
        assert_eq!(b.loading().count(), 0);
    }

    #[test]
    fn test_presenter_receives_loading_edges() {
        let presenter = Arc::new(RecordingPresenter::new());
        let ctx = HttpContext::new().with_presenter(presenter.clone());
        {
            let _guard = ctx.begin_loading(Some("Rendering"));
        }
        assert_eq!(presenter.events().len(), 2);
    }
}
