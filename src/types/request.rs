//! Request descriptors and per-request options.

use crate::error::{ApiError, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Cache behaviour requested for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Leave caching to the server and intermediaries.
    #[default]
    Default,
    /// Revalidate with the origin (`Cache-Control: no-cache`).
    NoCache,
    /// Never store the response (`Cache-Control: no-store`).
    NoStore,
}

impl CacheMode {
    /// Value for the `Cache-Control` header, if any.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            CacheMode::Default => None,
            CacheMode::NoCache => Some("no-cache"),
            CacheMode::NoStore => Some("no-store"),
        }
    }
}

/// Options recognised by the middleware chain.
///
/// | Field | Default | Effect |
/// |-------|---------|--------|
/// | `skip_auth` | `false` | no `Authorization` header, 401 does not trigger a refresh |
/// | `skip_error_handler` | `false` | no error notifications for this call |
/// | `show_loading` | `false` | drives the shared loading counter |
/// | `loading_text` | `None` | text shown with the loading indicator |
/// | `success_message` | `None` | notification shown when the call succeeds |
/// | `retry_count` | `0` | retries for retryable failures, 0 disables retry |
/// | `cache` | [`CacheMode::Default`] | cache headers |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Do not attach credentials.
    pub skip_auth: bool,
    /// The caller interprets failures itself; nothing is shown.
    pub skip_error_handler: bool,
    /// Count this request towards the loading indicator.
    pub show_loading: bool,
    /// Text for the loading indicator.
    pub loading_text: Option<String>,
    /// Notification shown on success.
    pub success_message: Option<String>,
    /// Maximum number of retries.
    pub retry_count: u32,
    /// Cache mode.
    pub cache: CacheMode,
}

impl RequestOptions {
    /// Options with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send without credentials.
    pub fn without_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Suppress error notifications.
    pub fn without_error_handler(mut self) -> Self {
        self.skip_error_handler = true;
        self
    }

    /// Show the loading indicator while the request is in flight.
    pub fn with_loading(mut self) -> Self {
        self.show_loading = true;
        self
    }

    /// Show the loading indicator with custom text.
    pub fn with_loading_text(mut self, text: impl Into<String>) -> Self {
        self.show_loading = true;
        self.loading_text = Some(text.into());
        self
    }

    /// Show a success notification once the request completes.
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Allow up to `count` retries on retryable failures.
    pub fn with_retries(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set the cache mode.
    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }
}

/// Callback receiving upload progress as a fraction in `[0.0, 1.0]`.
#[derive(Clone)]
pub struct ProgressCallback(Arc<dyn Fn(f64) + Send + Sync>);

impl ProgressCallback {
    /// Wrap a closure.
    pub fn new(callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Report progress, clamped to `[0.0, 1.0]`.
    pub fn report(&self, fraction: f64) {
        (self.0)(fraction.clamp(0.0, 1.0));
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressCallback")
    }
}

/// A file to send as a multipart form part.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Form field name, `file` by default.
    pub field_name: String,
    /// File name announced to the server.
    pub file_name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// File content.
    pub bytes: Bytes,
}

impl UploadFile {
    /// Create an upload from in-memory content, guessing the MIME type from the name.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            field_name: "file".to_string(),
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::InvalidRequest(format!("no file name in {}", path.display())))?;
        Ok(Self::new(file_name, bytes))
    }

    /// Use a different form field name.
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Override the guessed MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document.
    Json(serde_json::Value),
    /// Multipart form with a single file part.
    File {
        /// The file
        file: UploadFile,
        /// Optional progress reporting
        progress: Option<ProgressCallback>,
    },
}

/// How the response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    /// JSON, possibly wrapped in an envelope.
    #[default]
    Json,
    /// Opaque bytes (downloads).
    Binary,
    /// `text/event-stream`.
    EventStream,
}

/// One logical request.
///
/// Once handed to the client a descriptor is treated as immutable: middleware
/// works on its own copy, and a retry dispatches a derived copy whose
/// [`attempt`](RequestDescriptor::attempt) counter is one higher.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, or a path relative to the client's base URL.
    pub url: String,
    /// Body.
    pub body: RequestBody,
    /// Query parameters, in order.
    pub params: Vec<(String, String)>,
    /// Extra headers for this request.
    pub headers: HeaderMap,
    /// Expected response body.
    pub response_kind: ResponseKind,
    /// Middleware options.
    pub options: RequestOptions,
    attempt: u32,
}

impl RequestDescriptor {
    /// Create a descriptor with no body and default options.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
            params: Vec::new(),
            headers: HeaderMap::new(),
            response_kind: ResponseKind::Json,
            options: RequestOptions::default(),
            attempt: 0,
        }
    }

    /// GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// PATCH request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Serialize `body` as the JSON body.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("body is not serializable: {e}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Use an already-built JSON value as the body.
    pub fn with_json_value(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Send `file` as a multipart body.
    pub fn with_file(mut self, file: UploadFile, progress: Option<ProgressCallback>) -> Self {
        self.body = RequestBody::File { file, progress };
        self
    }

    /// Append one query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the options.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the expected response kind.
    pub fn with_response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = kind;
        self
    }

    /// Retry attempt this copy represents, 0 for the first dispatch.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Derived copy for the next retry attempt.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.attempt += 1;
        next
    }

    /// Identity used by the retry ledger: method and URL.
    pub fn identity(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}
