//! Request wrapper.
//!
//! [`ApiClient`] is the surface feature code talks to. Every operation
//! delegates to [`HttpClient`] and returns an [`Envelope`] instead of an error,
//! so callers branch on `success` rather than on `Result`.

use crate::client::{
    event_request, to_query_pairs, EventStream, EventSubscription, HttpClient, Poller,
    StreamCallbacks,
};
use crate::error::Result;
use crate::types::{
    Envelope, Paginated, Pagination, ProgressCallback, RequestDescriptor, RequestOptions,
    UploadFile,
};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Convenience operations on top of [`HttpClient`].
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    /// Wrap a client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// The underlying transport client.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// GET `url`.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Envelope<T> {
        self.http.get(url, options).await
    }

    /// POST `body` to `url`.
    pub async fn post<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.http.post(url, body, options).await
    }

    /// PUT `body` to `url`.
    pub async fn put<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.http.put(url, body, options).await
    }

    /// PATCH `url` with `body`.
    pub async fn patch<T, B>(&self, url: &str, body: &B, options: RequestOptions) -> Envelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.http.patch(url, body, options).await
    }

    /// DELETE `url`.
    pub async fn delete<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Envelope<T> {
        self.http.delete(url, options).await
    }

    /// GET one page of a collection.
    ///
    /// `page`, `page_size` and the optional sort go first in the query string,
    /// followed by `filters` (any object; nulls and empty strings are dropped).
    /// A filter with the same name as a pagination key replaces it.
    pub async fn paginated_get<T, F>(
        &self,
        url: &str,
        pagination: &Pagination,
        filters: &F,
    ) -> Envelope<Paginated<T>>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        let filters = match to_query_pairs(filters) {
            Ok(filters) => filters,
            Err(err) => return Envelope::from_result(Err(err)),
        };

        let mut params = pagination.to_query();
        params.retain(|(key, _)| !filters.iter().any(|(name, _)| name == key));
        params.extend(filters);

        let request = RequestDescriptor::get(url).with_params(params);
        self.http.request(request).await
    }

    /// Dispatch every request concurrently.
    ///
    /// Never fails as a whole: the result holds one envelope per request, in
    /// input order.
    pub async fn batch_request<T: DeserializeOwned>(
        &self,
        requests: Vec<RequestDescriptor>,
    ) -> Vec<Envelope<T>> {
        let total = requests.len();
        let results = join_all(requests.into_iter().map(|request| self.http.request(request))).await;

        let failed = results.iter().filter(|result| !result.is_success()).count();
        tracing::debug!(total, failed, "batch finished");
        results
    }

    /// Upload a file as multipart form data.
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        url: &str,
        file: UploadFile,
        on_progress: Option<ProgressCallback>,
    ) -> Envelope<T> {
        self.http
            .upload_file(url, file, on_progress, RequestOptions::default())
            .await
    }

    /// Download `url` into the configured download directory.
    pub async fn download_file(&self, url: &str, filename: Option<&str>) -> Result<PathBuf> {
        self.http
            .download_file(url, filename, RequestOptions::default())
            .await
    }

    /// Open a server-sent event stream, delivering decoded events to callbacks.
    ///
    /// Must be called within a Tokio runtime. Errors are logged and passed to
    /// `on_error`; they are never returned.
    pub fn stream_request<T>(&self, url: &str, callbacks: StreamCallbacks<T>) -> EventStream
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = event_request(self.http.config(), self.http.context(), url);
        EventStream::spawn(self.http.transport().clone(), request, callbacks)
    }

    /// Open a server-sent event stream as a `Stream` of decoded events.
    pub fn subscribe<T>(&self, url: &str) -> EventSubscription<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = event_request(self.http.config(), self.http.context(), url);
        EventSubscription::spawn(self.http.transport().clone(), request)
    }

    /// Create a poller for `url`. Call [`Poller::start`] to begin.
    ///
    /// `params` are serialized like pagination filters. If they cannot be,
    /// the poller is created without them and the problem is logged.
    pub fn poll_request<T, P>(
        &self,
        url: &str,
        params: &P,
        interval: Duration,
        max_attempts: Option<u32>,
    ) -> Poller<T>
    where
        T: DeserializeOwned + Send + 'static,
        P: Serialize + ?Sized,
    {
        let params = to_query_pairs(params).unwrap_or_else(|err| {
            tracing::warn!(url, error = %err, "ignoring unusable poll parameters");
            Vec::new()
        });
        Poller::new(self.http.clone(), url, params, interval, max_attempts)
    }
}

impl From<HttpClient> for ApiClient {
    fn from(http: HttpClient) -> Self {
        Self::new(http)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(HttpClient::new())
    }
}
