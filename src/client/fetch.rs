//! Transport client.
//!
//! [`HttpClient`] owns the configuration, the shared [`HttpContext`], the
//! middleware chain and the network backend. Every call builds a
//! [`RequestDescriptor`], resolves its URL against the base URL and runs it
//! through the chain.
//!
//! # Examples
//!
//! ## Simple GET request
//!
//! ```ignore
//! use studio_http::{HttpClient, Envelope};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = HttpClient::new();
//!     match client.get::<Value>("/voice/list", Default::default()).await {
//!         Envelope::Success(voices) => println!("{voices}"),
//!         Envelope::Failure(error) => eprintln!("{}", error.message),
//!     }
//! }
//! ```
//!
//! ## Retrying a slow generation call
//!
//! ```ignore
//! use studio_http::{HttpClient, RequestOptions};
//!
//! let options = RequestOptions::new()
//!     .with_retries(2)
//!     .with_loading_text("Synthesizing...");
//! let result = client
//!     .post::<serde_json::Value, _>("/voice/synthesize", &request, options)
//!     .await;
//! ```

use crate::client::{decode_payload, ClientConfig, ReqwestTransport, Transport};
use crate::error::Result;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::protocol::headers::parse_content_disposition_filename;
use crate::state::{AuthSession, FileSessionStore, HttpContext};
use crate::types::{
    Envelope, ProgressCallback, RawResponse, RequestDescriptor, RequestOptions, ResponseKind,
    UploadFile,
};
use http::header::{HeaderValue, ACCEPT, CONTENT_DISPOSITION};
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// HTTP client running requests through the middleware chain.
///
/// Cloning is cheap; clones share configuration, context and chain.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    chain: Arc<MiddlewareChain>,
    context: Arc<HttpContext>,
    config: Arc<ClientConfig>,
}

impl HttpClient {
    /// Client configured from the environment, with a fresh context.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::from_env())
    }

    /// Client with a custom configuration and a fresh context.
    pub fn with_config(config: ClientConfig) -> Self {
        HttpClientBuilder::new(config).build()
    }

    /// Start building a client.
    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder::new(config)
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared state of this client.
    pub fn context(&self) -> &Arc<HttpContext> {
        &self.context
    }

    /// Network backend.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Middleware chain.
    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// Store a session after login.
    pub fn login(&self, session: &AuthSession) -> Result<()> {
        self.context.session().save(session)
    }

    /// Forget the session.
    pub fn logout(&self) -> Result<()> {
        self.context.session().clear()
    }

    /// Run a request through the chain and return the raw response.
    pub async fn send(&self, mut request: RequestDescriptor) -> Result<RawResponse> {
        request.url = self.config.resolve_url(&request.url);
        self.chain.run(self.transport.as_ref(), request).await
    }

    /// Run a request and decode its (possibly enveloped) JSON payload.
    pub async fn fetch<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let raw = self.send(request).await?;
        decode_payload(&raw.body)
    }

    /// Run a request and wrap the outcome in an envelope.
    pub async fn request<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Envelope<T> {
        Envelope::from_result(self.fetch(request).await)
    }

    /// GET `url`.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Envelope<T> {
        self.request(RequestDescriptor::get(url).with_options(options))
            .await
    }

    /// POST `body` as JSON to `url`.
    pub async fn post<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::POST, url, body, options).await
    }

    /// PUT `body` as JSON to `url`.
    pub async fn put<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PUT, url, body, options).await
    }

    /// PATCH `url` with `body` as JSON.
    pub async fn patch<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PATCH, url, body, options).await
    }

    /// DELETE `url`.
    pub async fn delete<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Envelope<T> {
        self.request(RequestDescriptor::delete(url).with_options(options))
            .await
    }

    async fn with_body<T, B>(
        &self,
        method: Method,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match RequestDescriptor::new(method, url).with_json(body) {
            Ok(request) => self.request(request.with_options(options)).await,
            Err(err) => Envelope::from_result(Err(err)),
        }
    }

    /// Upload `file` as a multipart form, reporting progress in `[0.0, 1.0]`.
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        url: &str,
        file: UploadFile,
        on_progress: Option<ProgressCallback>,
        options: RequestOptions,
    ) -> Envelope<T> {
        let request = RequestDescriptor::post(url)
            .with_file(file, on_progress)
            .with_options(options);
        self.request(request).await
    }

    /// Download `url` into the download directory.
    ///
    /// The file is named `filename` when given, otherwise after the
    /// `Content-Disposition` header, the last URL path segment, or `download`.
    /// Returns the path written; the body itself is not returned.
    pub async fn download_file(
        &self,
        url: &str,
        filename: Option<&str>,
        options: RequestOptions,
    ) -> Result<PathBuf> {
        let request = RequestDescriptor::get(url)
            .with_response_kind(ResponseKind::Binary)
            .with_header(ACCEPT, HeaderValue::from_static("*/*"))
            .with_options(options);
        let response = self.send(request).await?;

        let name = filename
            .map(str::to_string)
            .or_else(|| {
                response
                    .header(CONTENT_DISPOSITION.as_str())
                    .and_then(parse_content_disposition_filename)
            })
            .or_else(|| last_path_segment(url))
            .unwrap_or_else(|| "download".to_string());
        let name = sanitize_file_name(&name);

        let dir = &self.config.download_dir;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, &response.body).await?;

        tracing::info!(path = %path.display(), bytes = response.body.len(), "download saved");
        Ok(path)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn last_path_segment(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
}

/// Keep only the final path component so a server-supplied name cannot
/// escape the download directory.
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map_or_else(|| "download".to_string(), str::to_string)
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    config: ClientConfig,
    context: Option<Arc<HttpContext>>,
    session_dir: Option<PathBuf>,
    transport: Option<Arc<dyn Transport>>,
    extra: Vec<Arc<dyn Middleware>>,
}

impl HttpClientBuilder {
    /// Builder with `config`, a fresh context and the reqwest transport.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            context: None,
            session_dir: None,
            transport: None,
            extra: Vec::new(),
        }
    }

    /// Share an existing context.
    pub fn context(mut self, context: Arc<HttpContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Persist the session as `<dir>/<session_key>.json`.
    ///
    /// Ignored when an explicit [`context`](Self::context) is supplied.
    pub fn persist_session(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Use a custom network backend.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a stage after the standard chain, right before the transport.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.extra.push(Arc::new(middleware));
        self
    }

    /// Build the client.
    pub fn build(self) -> HttpClient {
        let config = Arc::new(self.config);
        let session_dir = self.session_dir;
        let context = self.context.unwrap_or_else(|| {
            let context = HttpContext::new();
            Arc::new(match session_dir {
                Some(dir) => context.with_session_store(Arc::new(FileSessionStore::new(
                    dir,
                    &config.session_key,
                ))),
                None => context,
            })
        });
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(&config)));

        let chain = self.extra.into_iter().fold(
            MiddlewareChain::standard(context.clone(), config.clone(), transport.clone()),
            MiddlewareChain::with_shared,
        );

        HttpClient {
            transport,
            chain: Arc::new(chain),
            context,
            config,
        }
    }
}

impl From<HttpClientBuilder> for HttpClient {
    fn from(builder: HttpClientBuilder) -> Self {
        builder.build()
    }
}
