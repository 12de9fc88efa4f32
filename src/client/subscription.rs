//! Server-sent event streams.
//!
//! Streams bypass the middleware chain: they go straight to the
//! [`Transport`] with the access token appended as the `token` query
//! parameter, because event-stream consumers cannot set headers. The body is
//! parsed incrementally with [`SseParser`] and every `data` payload is decoded
//! as JSON.
//!
//! Two consumption styles are offered:
//!
//! - **[`EventStream`]**: callback driven, closed explicitly with
//!   [`EventStream::close`]
//! - **[`EventSubscription`]**: implements `Stream` for use with `StreamExt`
//!
//! # Examples
//!
//! ## Callbacks
//!
//! ```ignore
//! use studio_http::{ApiClient, StreamCallbacks};
//!
//! let stream = api.stream_request(
//!     "/tasks/42/events",
//!     StreamCallbacks::new(|event: serde_json::Value| println!("{event}"))
//!         .on_error(|err| eprintln!("stream error: {err}"))
//!         .on_close(|| println!("closed")),
//! );
//! // later
//! stream.close();
//! ```
//!
//! ## Using EventSubscription
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut events = api.subscribe::<serde_json::Value>("/tasks/42/events");
//! while let Some(result) = events.next().await {
//!     match result {
//!         Ok(event) => println!("{event}"),
//!         Err(e) => eprintln!("stream error: {e}"),
//!     }
//! }
//! ```

use crate::client::{ClientConfig, SseParser, Transport};
use crate::error::{ApiError, Result};
use crate::state::HttpContext;
use crate::types::{RequestDescriptor, ResponseKind};
use futures::{Stream, StreamExt};
use http::header::{HeaderValue, ACCEPT, CACHE_CONTROL};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

const SUBSCRIPTION_BUFFER: usize = 64;

type MessageHandler<T> = Arc<dyn Fn(T) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Callbacks for [`EventStream`].
pub struct StreamCallbacks<T> {
    on_message: MessageHandler<T>,
    on_error: Option<ErrorHandler>,
    on_close: CloseHook,
}

impl<T> StreamCallbacks<T> {
    /// Callbacks invoking `on_message` for every decoded event.
    pub fn new(on_message: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            on_message: Arc::new(on_message),
            on_error: None,
            on_close: CloseHook::default(),
        }
    }

    /// Called for connection failures and undecodable events.
    pub fn on_error(mut self, on_error: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Called once, when the stream ends or is closed.
    pub fn on_close(mut self, on_close: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = CloseHook::new(on_close);
        self
    }

    fn error(&self, err: &ApiError) {
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
    }
}

/// Runs a close callback at most once.
#[derive(Clone, Default)]
struct CloseHook(Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>);

impl CloseHook {
    fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(callback)))))
    }

    fn fire(&self) {
        let callback = self.0.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Build the GET request for an event stream at `url`.
///
/// The access token, when present, is appended as the `token` query parameter.
pub fn event_request(
    config: &ClientConfig,
    context: &HttpContext,
    url: &str,
) -> Result<RequestDescriptor> {
    let resolved = config.resolve_url(url);
    let mut parsed = Url::parse(&resolved)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid stream url {resolved}: {e}")))?;
    if let Some(token) = context.access_token()? {
        parsed.query_pairs_mut().append_pair("token", &token);
    }

    Ok(RequestDescriptor::get(parsed.to_string())
        .with_response_kind(ResponseKind::EventStream)
        .with_header(ACCEPT, HeaderValue::from_static("text/event-stream"))
        .with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache")))
}

/// Handle to a callback-driven event stream.
///
/// Dropping the handle leaves the stream running; call [`close`](Self::close)
/// to stop it.
pub struct EventStream {
    task: JoinHandle<()>,
    on_close: CloseHook,
}

impl EventStream {
    /// Start consuming `request` on a background task.
    pub fn spawn<T>(
        transport: Arc<dyn Transport>,
        request: Result<RequestDescriptor>,
        callbacks: StreamCallbacks<T>,
    ) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        let on_close = callbacks.on_close.clone();
        let task = tokio::spawn(async move {
            match request {
                Ok(request) => run_callbacks(transport.as_ref(), &request, &callbacks).await,
                Err(err) => {
                    tracing::error!(error = %err, "could not open event stream");
                    callbacks.error(&err);
                }
            }
            callbacks.on_close.fire();
        });

        EventStream { task, on_close }
    }

    /// Stop the stream. `on_close` fires if it has not already.
    pub fn close(&self) {
        self.task.abort();
        self.on_close.fire();
    }

    /// Whether the stream has ended.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_callbacks<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: &RequestDescriptor,
    callbacks: &StreamCallbacks<T>,
) {
    let mut body = match transport.open_stream(request).await {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(url = %request.url, error = %err, "could not open event stream");
            callbacks.error(&err);
            return;
        }
    };
    tracing::debug!(url = %request.url, "event stream opened");

    let mut parser = SseParser::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, "event stream failed");
                callbacks.error(&err);
                return;
            }
        };
        for event in parser.feed(&chunk) {
            match serde_json::from_str::<T>(&event.data) {
                Ok(message) => (callbacks.on_message)(message),
                Err(err) => {
                    let err = ApiError::from(err);
                    tracing::warn!(url = %request.url, error = %err, "undecodable event");
                    callbacks.error(&err);
                }
            }
        }
    }
    tracing::debug!(url = %request.url, "event stream ended");
}

/// An event stream that implements the `Stream` trait.
///
/// Items are decoded events or errors; the stream ends when the server closes
/// the connection or after a connection error. Dropping it closes the
/// connection.
pub struct EventSubscription<T> {
    receiver: ReceiverStream<Result<T>>,
    task: JoinHandle<()>,
}

impl<T> EventSubscription<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Start consuming `request` on a background task.
    pub fn spawn(transport: Arc<dyn Transport>, request: Result<RequestDescriptor>) -> Self {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            let request = match request {
                Ok(request) => request,
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };
            pump(transport.as_ref(), &request, &tx).await;
        });

        EventSubscription {
            receiver: ReceiverStream::new(rx),
            task,
        }
    }
}

async fn pump<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: &RequestDescriptor,
    tx: &mpsc::Sender<Result<T>>,
) {
    let mut body = match transport.open_stream(request).await {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(url = %request.url, error = %err, "could not open event stream");
            let _ = tx.send(Err(err)).await;
            return;
        }
    };

    let mut parser = SseParser::new();
    while let Some(chunk) = body.next().await {
        let events = match chunk {
            Ok(chunk) => parser.feed(&chunk),
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, "event stream failed");
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        for event in events {
            let item = serde_json::from_str::<T>(&event.data).map_err(ApiError::from);
            if tx.send(item).await.is_err() {
                // receiver dropped
                return;
            }
        }
    }
}

impl<T> Stream for EventSubscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<T> Drop for EventSubscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
