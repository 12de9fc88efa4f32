//! End-to-end pipeline scenarios over a scripted transport.
//!
//! Time is paused, so retry delays and polling intervals are observed exactly.

use crate::client::{ApiClient, ByteStream, ClientConfig, HttpClient, StreamCallbacks, Transport};
use crate::error::{ApiError, ErrorClass, Result};
use crate::state::{
    AuthSession, HttpContext, MemorySessionStore, NotificationLevel, PresenterEvent,
    RecordingPresenter,
};
use crate::types::{Envelope, RawResponse, RequestDescriptor, RequestOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use http::header::AUTHORIZATION;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const BASE: &str = "http://studio.test/api";

/// What the scripted transport saw for one exchange.
#[derive(Debug, Clone)]
struct Seen {
    at_ms: u64,
    method: String,
    url: String,
    authorization: Option<String>,
    request_id: Option<String>,
    attempt: u32,
}

type Script = Box<dyn Fn(&RequestDescriptor, usize) -> Result<RawResponse> + Send + Sync>;

struct ScriptedTransport {
    started: Instant,
    seen: Mutex<Vec<Seen>>,
    script: Script,
    delay: Duration,
    events: Vec<&'static str>,
}

impl ScriptedTransport {
    fn new(script: impl Fn(&RequestDescriptor, usize) -> Result<RawResponse> + Send + Sync + 'static) -> Self {
        Self {
            started: Instant::now(),
            seen: Mutex::new(Vec::new()),
            script: Box::new(script),
            delay: Duration::ZERO,
            events: Vec::new(),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_events(mut self, events: Vec<&'static str>) -> Self {
        self.events = events;
        self
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn calls_to(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|s| s.url.ends_with(path)).count()
    }

    fn record(&self, request: &RequestDescriptor) -> usize {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let mut seen = self.seen.lock();
        seen.push(Seen {
            at_ms: self.started.elapsed().as_millis() as u64,
            method: request.method.to_string(),
            url: request.url.clone(),
            authorization: header(AUTHORIZATION.as_str()),
            request_id: header("x-request-id"),
            attempt: request.attempt(),
        });
        seen.len() - 1
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        let index = self.record(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(request, index)
    }

    async fn open_stream(&self, request: &RequestDescriptor) -> Result<ByteStream> {
        self.record(request);
        let chunks: Vec<Result<Bytes>> = self
            .events
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

fn ok(body: Value) -> Result<RawResponse> {
    Ok(RawResponse::new(200, body.to_string()))
}

fn status(code: u16) -> Result<RawResponse> {
    Ok(RawResponse::new(code, ""))
}

fn bearer(request: &RequestDescriptor) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

struct Harness {
    api: ApiClient,
    transport: Arc<ScriptedTransport>,
    presenter: Arc<RecordingPresenter>,
    context: Arc<HttpContext>,
}

fn harness(transport: ScriptedTransport) -> Harness {
    harness_with_session(transport, None)
}

fn harness_with_session(transport: ScriptedTransport, session: Option<AuthSession>) -> Harness {
    let transport = Arc::new(transport);
    let presenter = Arc::new(RecordingPresenter::new());
    let store = match &session {
        Some(session) => MemorySessionStore::with_session(session).unwrap(),
        None => MemorySessionStore::new(),
    };
    let context = Arc::new(HttpContext::with_parts(Arc::new(store), presenter.clone()));

    let http = HttpClient::builder(ClientConfig::default().with_base_url(BASE))
        .context(context.clone())
        .transport(transport.clone())
        .build();

    Harness {
        api: ApiClient::new(http),
        transport,
        presenter,
        context,
    }
}

#[tokio::test(start_paused = true)]
async fn test_server_error_retries_with_backoff() {
    let h = harness(ScriptedTransport::new(|_, _| status(500)));

    let err = h
        .api
        .http()
        .fetch::<Value>(
            RequestDescriptor::post("/voice/synthesize")
                .with_json(&json!({ "text": "hi" }))
                .unwrap()
                .with_options(RequestOptions::new().with_retries(2)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Server);
    let seen = h.transport.seen();
    let times: Vec<u64> = seen.iter().map(|s| s.at_ms).collect();
    assert_eq!(times, vec![0, 1_000, 3_000]);
    assert_eq!(seen.iter().map(|s| s.attempt).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(seen.iter().all(|s| s.method == "POST"));
    assert!(h.context.retries().is_empty());

    // one notification for the whole call, not one per attempt
    let notifications = h.presenter.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_persistent());
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_gets_a_fresh_request_id() {
    let h = harness(ScriptedTransport::new(|_, index| {
        if index == 0 {
            status(503)
        } else {
            ok(json!({ "id": 7 }))
        }
    }));

    let result: Envelope<Value> = h
        .api
        .get("/images/7", RequestOptions::new().with_retries(3))
        .await;

    assert_eq!(result.data(), Some(&json!({ "id": 7 })));
    let seen = h.transport.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].at_ms, 1_000);
    let ids: Vec<String> = seen.iter().map(|s| s.request_id.clone().unwrap()).collect();
    assert!(ids.iter().all(|id| id.starts_with("req_")));
    assert_ne!(ids[0], ids[1]);
    assert!(h.context.retries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_sends_once() {
    let h = harness(ScriptedTransport::new(|_, _| status(503)));

    let result: Envelope<Value> = h.api.get("/voice/list", RequestOptions::new()).await;

    assert!(!result.is_success());
    assert_eq!(result.error().unwrap().code, "HTTP_503");
    assert_eq!(h.transport.seen().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_are_not_retried() {
    let h = harness(ScriptedTransport::new(|_, _| status(404)));

    let result: Envelope<Value> = h
        .api
        .get("/images/missing", RequestOptions::new().with_retries(3))
        .await;

    assert_eq!(result.error().unwrap().code, "HTTP_404");
    assert_eq!(h.transport.seen().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loading_indicator_pairs_across_concurrent_calls() {
    let h = harness(
        ScriptedTransport::new(|_, _| ok(json!({}))).with_delay(Duration::from_millis(100)),
    );
    let options = RequestOptions::new().with_loading_text("Loading voices");

    let (a, b, c) = tokio::join!(
        h.api.get::<Value>("/voice/list", options.clone()),
        h.api.get::<Value>("/voice/presets", options.clone()),
        h.api.get::<Value>("/voice/quota", RequestOptions::new()),
    );
    assert!(a.is_success() && b.is_success() && c.is_success());

    assert_eq!(h.context.loading().count(), 0);
    let loading: Vec<PresenterEvent> = h
        .presenter
        .events()
        .into_iter()
        .filter(|e| matches!(e, PresenterEvent::Loading { .. }))
        .collect();
    assert_eq!(
        loading,
        vec![
            PresenterEvent::Loading {
                visible: true,
                text: Some("Loading voices".to_string())
            },
            PresenterEvent::Loading {
                visible: false,
                text: None
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_loading_counter_settles_on_failure() {
    let h = harness(ScriptedTransport::new(|_, _| status(500)));

    let result: Envelope<Value> = h
        .api
        .get("/images", RequestOptions::new().with_loading().with_retries(1))
        .await;

    assert!(!result.is_success());
    assert_eq!(h.context.loading().count(), 0);
    assert!(!h.context.loading().is_visible());
}

#[tokio::test(start_paused = true)]
async fn test_batch_preserves_order_and_isolates_failures() {
    let h = harness(ScriptedTransport::new(|request, _| {
        if request.url.ends_with("/images/2") {
            status(404)
        } else {
            ok(json!({ "url": request.url }))
        }
    }));

    let results: Vec<Envelope<Value>> = h
        .api
        .batch_request(vec![
            RequestDescriptor::get("/images/1"),
            RequestDescriptor::get("/images/2"),
            RequestDescriptor::get("/images/3"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].data().unwrap()["url"],
        format!("{BASE}/images/1")
    );
    assert_eq!(results[1].error().unwrap().code, "HTTP_404");
    assert_eq!(
        results[2].data().unwrap()["url"],
        format!("{BASE}/images/3")
    );
}

#[tokio::test(start_paused = true)]
async fn test_identical_concurrent_requests_retry_independently() {
    let h = harness(ScriptedTransport::new(|_, _| status(503)));
    let request =
        || RequestDescriptor::get("/voice/list").with_options(RequestOptions::new().with_retries(2));

    let results: Vec<Envelope<Value>> = h.api.batch_request(vec![request(), request()]).await;

    assert!(results.iter().all(|r| !r.is_success()));
    let mut attempts: Vec<(u32, u64)> = h
        .transport
        .seen()
        .iter()
        .map(|s| (s.attempt, s.at_ms))
        .collect();
    attempts.sort();
    assert_eq!(
        attempts,
        vec![(0, 0), (0, 0), (1, 1_000), (1, 1_000), (2, 3_000), (2, 3_000)]
    );
    assert!(h.context.retries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let h = harness(ScriptedTransport::new(|_, _| ok(json!({}))));
    let results: Vec<Envelope<Value>> = h.api.batch_request(Vec::new()).await;
    assert!(results.is_empty());
    assert!(h.transport.seen().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_refreshes_once_and_replays() {
    let h = harness_with_session(
        ScriptedTransport::new(|request, _| {
            if request.url.ends_with("/auth/refresh") {
                return ok(json!({ "success": true, "data": { "access_token": "fresh" } }));
            }
            match bearer(request) {
                Some("Bearer fresh") => ok(json!({ "name": "narrator" })),
                _ => status(401),
            }
        }),
        Some(AuthSession::new("stale", Some("r-1".to_string()))),
    );

    let result: Envelope<Value> = h.api.get("/voice/7", RequestOptions::new()).await;

    assert_eq!(result.data(), Some(&json!({ "name": "narrator" })));
    assert_eq!(h.transport.calls_to("/auth/refresh"), 1);
    let seen = h.transport.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer stale"));
    assert_eq!(seen[1].method, "POST");
    assert_eq!(seen[1].authorization, None);
    assert_eq!(seen[2].authorization.as_deref(), Some("Bearer fresh"));

    let session = h.context.session().load().unwrap().unwrap();
    assert_eq!(session.token, "fresh");
    assert_eq!(session.refresh_token.as_deref(), Some("r-1"));
    assert!(h.presenter.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_logs_out() {
    let h = harness_with_session(
        ScriptedTransport::new(|_, _| status(401)),
        Some(AuthSession::new("stale", Some("r-1".to_string()))),
    );

    let result: Envelope<Value> = h.api.get("/voice/7", RequestOptions::new()).await;

    assert_eq!(result.error().unwrap().code, "SESSION_EXPIRED");
    assert_eq!(h.transport.seen().len(), 2);
    assert_eq!(h.transport.calls_to("/auth/refresh"), 1);
    assert_eq!(h.context.session().load().unwrap(), None);
    assert_eq!(h.presenter.redirects(), vec!["/login".to_string()]);

    let notifications = h.presenter.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Warning);
}

#[tokio::test(start_paused = true)]
async fn test_missing_refresh_token_logs_out_without_calling() {
    let h = harness_with_session(
        ScriptedTransport::new(|_, _| status(401)),
        Some(AuthSession::new("stale", None)),
    );

    let result: Envelope<Value> = h.api.get("/voice/7", RequestOptions::new()).await;

    assert!(!result.is_success());
    assert_eq!(h.transport.calls_to("/auth/refresh"), 0);
    assert_eq!(h.presenter.redirects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_unauthorized_share_one_refresh() {
    let h = harness_with_session(
        ScriptedTransport::new(|request, _| {
            if request.url.ends_with("/auth/refresh") {
                return ok(json!({ "access_token": "fresh", "refresh_token": "r-2" }));
            }
            match bearer(request) {
                Some("Bearer fresh") => ok(json!({ "ok": true })),
                _ => status(401),
            }
        })
        .with_delay(Duration::from_millis(50)),
        Some(AuthSession::new("stale", Some("r-1".to_string()))),
    );

    let (a, b, c) = tokio::join!(
        h.api.get::<Value>("/images/1", RequestOptions::new()),
        h.api.get::<Value>("/images/2", RequestOptions::new()),
        h.api.get::<Value>("/images/3", RequestOptions::new()),
    );

    assert!(a.is_success() && b.is_success() && c.is_success());
    assert_eq!(h.transport.calls_to("/auth/refresh"), 1);
    assert!(!h.context.refresh_gate().is_refreshing());
    let session = h.context.session().load().unwrap().unwrap();
    assert_eq!(session.refresh_token.as_deref(), Some("r-2"));
}

#[tokio::test(start_paused = true)]
async fn test_skip_auth_sends_no_token_and_never_refreshes() {
    let h = harness_with_session(
        ScriptedTransport::new(|_, _| status(401)),
        Some(AuthSession::new("stale", Some("r-1".to_string()))),
    );

    let result: Envelope<Value> = h
        .api
        .post("/auth/login", &json!({ "user": "a" }), RequestOptions::new().without_auth())
        .await;

    assert!(!result.is_success());
    let seen = h.transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization, None);
    assert!(h.context.session().load().unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_validation_error_notifies_per_field() {
    let h = harness(ScriptedTransport::new(|_, _| {
        Ok(RawResponse::new(
            422,
            json!({
                "success": false,
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Invalid input",
                    "details": { "errors": [
                        { "field": "prompt", "message": "is required" },
                        { "field": "width", "message": "must be a multiple of 8" }
                    ]}
                }
            })
            .to_string(),
        ))
    }));

    let result: Envelope<Value> = h
        .api
        .post("/images/generate", &json!({}), RequestOptions::new())
        .await;

    let error = result.error().unwrap();
    assert_eq!(error.code, "VALIDATION_ERROR");
    assert_eq!(error.field_errors().len(), 2);
    let messages: Vec<String> = h
        .presenter
        .notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(
        messages,
        vec!["prompt: is required", "width: must be a multiple of 8"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_skip_error_handler_is_silent() {
    let h = harness(ScriptedTransport::new(|_, _| status(500)));

    let result: Envelope<Value> = h
        .api
        .get("/health", RequestOptions::new().without_error_handler())
        .await;

    assert_eq!(result.error().unwrap().message, "Internal server error");
    assert!(h.presenter.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_success_message_and_envelope_unwrapping() {
    let h = harness(ScriptedTransport::new(|_, _| {
        ok(json!({ "success": true, "data": { "id": "voice-9" } }))
    }));

    let result: Envelope<Value> = h
        .api
        .put(
            "/voice/9",
            &json!({ "name": "calm" }),
            RequestOptions::new().with_success_message("Voice saved"),
        )
        .await;

    assert_eq!(result.data(), Some(&json!({ "id": "voice-9" })));
    let notifications = h.presenter.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert_eq!(notifications[0].message, "Voice saved");
}

#[tokio::test(start_paused = true)]
async fn test_failure_envelope_with_ok_status_is_rejected() {
    let h = harness(ScriptedTransport::new(|_, _| {
        ok(json!({ "success": false, "error": { "code": "QUOTA_EXCEEDED", "message": "Monthly quota used up" } }))
    }));

    let err = h
        .api
        .http()
        .fetch::<Value>(RequestDescriptor::post("/voice/synthesize"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { status: 200, .. }));
    assert_eq!(err.to_error_body().code, "QUOTA_EXCEEDED");
    assert_eq!(h.presenter.notifications()[0].message, "Monthly quota used up");
}

#[tokio::test(start_paused = true)]
async fn test_paginated_get_builds_query() {
    let h = harness(ScriptedTransport::new(|request, _| {
        let query: Vec<String> = request
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        ok(json!({ "items": [query], "total": 41, "page": 3, "pageSize": 20 }))
    }));

    let page = h
        .api
        .paginated_get::<Vec<String>, _>(
            "/images",
            &crate::types::Pagination::page(3).sorted_by("created_at", crate::types::SortOrder::Desc),
            &json!({ "tag": "portrait", "owner": null, "q": "" }),
        )
        .await
        .into_result()
        .unwrap();

    assert_eq!(page.total, 41);
    assert_eq!(page.page, 3);
    assert_eq!(
        page.items[0],
        vec![
            "page=3",
            "page_size=20",
            "sort_by=created_at",
            "sort_order=desc",
            "tag=portrait"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_paginated_get_filters_override_pagination_keys() {
    let h = harness(ScriptedTransport::new(|request, _| {
        let query: Vec<String> = request
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        ok(json!({ "items": [query] }))
    }));

    let page = h
        .api
        .paginated_get::<Vec<String>, _>(
            "/images",
            &crate::types::Pagination::default(),
            &json!({ "page": 3, "sort_by": "name" }),
        )
        .await
        .into_result()
        .unwrap();

    assert_eq!(page.items[0], vec!["page_size=20", "page=3", "sort_by=name"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_with_null_data_decodes_as_unit() {
    let h = harness(ScriptedTransport::new(|_, _| {
        ok(json!({ "success": true, "data": null }))
    }));

    let result: Envelope<()> = h.api.delete("/images/7", RequestOptions::new()).await;

    assert_eq!(result, Envelope::Success(()));
    assert_eq!(h.transport.seen()[0].method, "DELETE");
}

#[tokio::test(start_paused = true)]
async fn test_poll_fires_on_interval_and_stops_at_max() {
    let h = harness(ScriptedTransport::new(|_, index| {
        ok(json!({ "status": if index < 2 { "running" } else { "done" } }))
    }));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let poller = h
        .api
        .poll_request::<Value, _>("/tasks/5", &json!({ "verbose": true }), Duration::from_millis(1_000), Some(3));
    poller.on_data(move |data| sink.lock().push(data["status"].clone()));
    poller.start();

    tokio::time::sleep(Duration::from_millis(10_000)).await;

    let seen = h.transport.seen();
    assert_eq!(seen.iter().map(|s| s.at_ms).collect::<Vec<_>>(), vec![0, 1_000, 2_000]);
    assert!(!poller.is_running());
    assert_eq!(poller.attempts(), 3);
    assert_eq!(*received.lock(), vec![json!("running"), json!("running"), json!("done")]);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_count_towards_max() {
    let h = harness(ScriptedTransport::new(|_, _| status(502)));
    let errors = Arc::new(Mutex::new(0));
    let sink = errors.clone();

    let poller = h
        .api
        .poll_request::<Value, _>("/tasks/5", &json!({}), Duration::from_millis(500), Some(2));
    poller.on_error(move |_| *sink.lock() += 1);
    poller.start();

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(*errors.lock(), 2);
    assert_eq!(h.transport.seen().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stream_delivers_events_and_closes() {
    let h = harness_with_session(
        ScriptedTransport::new(|_, _| status(500)).with_events(vec![
            ": connected\n\n",
            "data: {\"progress\": 10}\n",
            "\ndata: {\"progress\": 100}\n\n",
        ]),
        Some(AuthSession::new("tok", None)),
    );
    let messages = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(Mutex::new(0));
    let (sink, close_sink) = (messages.clone(), closed.clone());

    let stream = h.api.stream_request(
        "/tasks/5/events",
        StreamCallbacks::new(move |event: Value| sink.lock().push(event["progress"].clone()))
            .on_close(move || *close_sink.lock() += 1),
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(stream.is_closed());
    stream.close();

    assert_eq!(*messages.lock(), vec![json!(10), json!(100)]);
    assert_eq!(*closed.lock(), 1);
    let seen = h.transport.seen();
    assert_eq!(seen[0].url, format!("{BASE}/tasks/5/events?token=tok"));
}
