//! Interval polling.
//!
//! A [`Poller`] repeatedly GETs one URL through the full middleware chain. The
//! first poll fires as soon as [`Poller::start`] is called, then one every
//! interval. Polling stops on [`Poller::stop`], on drop, or once
//! `max_attempts` polls (successful or not) have completed.
//!
//! ```text
//!  t=0        t=interval   t=2*interval
//!   │ poll 1     │ poll 2     │ poll 3 ── max_attempts reached ── stopped
//! ```

use crate::client::HttpClient;
use crate::error::ApiError;
use crate::types::RequestDescriptor;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

type DataHandler<T> = Arc<dyn Fn(T) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Controller for one polling loop.
pub struct Poller<T> {
    shared: Arc<PollState<T>>,
}

struct PollState<T> {
    client: HttpClient,
    url: String,
    params: Vec<(String, String)>,
    interval: Duration,
    max_attempts: Option<u32>,
    running: AtomicBool,
    attempts: AtomicU32,
    /// Run generation, bumped by `stop`. A loop exits when it sees a change
    /// and drops any poll that completes after it.
    stop_signal: watch::Sender<u64>,
    on_data: Mutex<Option<DataHandler<T>>>,
    on_error: Mutex<Option<ErrorHandler>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Poller<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Poller for `url` with the given query parameters. Nothing is sent
    /// until [`start`](Self::start).
    pub fn new(
        client: HttpClient,
        url: impl Into<String>,
        params: Vec<(String, String)>,
        interval: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        let (stop_signal, _) = watch::channel(0);
        Poller {
            shared: Arc::new(PollState {
                client,
                url: url.into(),
                params,
                interval: interval.max(Duration::from_millis(1)),
                max_attempts,
                running: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
                stop_signal,
                on_data: Mutex::new(None),
                on_error: Mutex::new(None),
                _marker: PhantomData,
            }),
        }
    }

    /// Set the handler for successful polls.
    pub fn on_data(&self, handler: impl Fn(T) + Send + Sync + 'static) -> &Self {
        *self.shared.on_data.lock() = Some(Arc::new(handler));
        self
    }

    /// Set the handler for failed polls.
    pub fn on_error(&self, handler: impl Fn(&ApiError) + Send + Sync + 'static) -> &Self {
        *self.shared.on_error.lock() = Some(Arc::new(handler));
        self
    }

    /// Start polling. No-op if already running.
    pub fn start(&self) -> &Self {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return self;
        }
        self.shared.attempts.store(0, Ordering::SeqCst);

        let stop = self.shared.stop_signal.subscribe();
        let shared = self.shared.clone();
        tokio::spawn(run_loop(shared, stop));
        tracing::debug!(url = %self.shared.url, interval_ms = self.shared.interval.as_millis() as u64, "polling started");
        self
    }

    /// Stop polling. A poll already in flight is discarded: it is neither
    /// counted nor delivered, even if polling is restarted meanwhile.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.stop_signal.send_modify(|generation| *generation += 1);
            tracing::debug!(url = %self.shared.url, "polling stopped");
        }
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Polls completed since the last start.
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.stop_signal.send_modify(|generation| *generation += 1);
        }
    }
}

async fn run_loop<T>(shared: Arc<PollState<T>>, mut stop: watch::Receiver<u64>)
where
    T: DeserializeOwned + Send + 'static,
{
    let generation = *stop.borrow_and_update();
    let mut ticker = tokio::time::interval(shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        let request = RequestDescriptor::get(shared.url.clone()).with_params(shared.params.clone());
        let outcome = shared.client.fetch::<T>(request).await;
        if *stop.borrow() != generation {
            tracing::debug!(url = %shared.url, "discarding poll from a stopped run");
            break;
        }
        let attempts = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match outcome {
            Ok(data) => {
                let handler = shared.on_data.lock().clone();
                if let Some(handler) = handler {
                    handler(data);
                }
            }
            Err(err) => {
                tracing::warn!(url = %shared.url, attempts, error = %err, "poll failed");
                let handler = shared.on_error.lock().clone();
                if let Some(handler) = handler {
                    handler(&err);
                }
            }
        }

        if *stop.borrow() != generation {
            break;
        }
        if shared.max_attempts.is_some_and(|max| attempts >= max) {
            shared.running.store(false, Ordering::SeqCst);
            tracing::debug!(url = %shared.url, attempts, "polling finished");
            break;
        }
    }
}
