//! Single-flight gate for token refreshes.

use super::session::AuthSession;
use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type SharedRefresh = Shared<BoxFuture<'static, Result<AuthSession>>>;

/// Ensures at most one refresh is in flight per context.
///
/// The first caller starts the refresh; callers arriving while it runs await
/// the same future and observe the same outcome. Once it settles the slot is
/// emptied and the next caller starts a fresh one.
#[derive(Default)]
pub struct RefreshGate {
    inflight: Mutex<Option<SharedRefresh>>,
}

impl RefreshGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Join the in-flight refresh, or start one with `start`.
    pub async fn run<F>(&self, start: F) -> Result<AuthSession>
    where
        F: FnOnce() -> BoxFuture<'static, Result<AuthSession>>,
    {
        let refresh = {
            let mut slot = self.inflight.lock();
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = start().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let outcome = refresh.clone().await;

        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_refresh() {
        let gate = Arc::new(RefreshGate::new());
        let started = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            let started = started.clone();
            tasks.push(tokio::spawn(async move {
                gate.run(|| {
                    started.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(AuthSession::new("fresh", None))
                    }
                    .boxed()
                })
                .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().token, "fresh");
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());
    }

    #[tokio::test]
    async fn test_sequential_callers_refresh_again() {
        let gate = RefreshGate::new();
        let started = AtomicUsize::new(0);

        for _ in 0..2 {
            gate.run(|| {
                started.fetch_add(1, Ordering::SeqCst);
                async { Ok(AuthSession::new("t", None)) }.boxed()
            })
            .await
            .unwrap();
        }
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }
}
