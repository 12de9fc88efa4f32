//! Network backends.
//!
//! A [`Transport`] performs exactly one HTTP exchange for a fully prepared
//! [`RequestDescriptor`] (absolute URL, final headers). It does not interpret
//! statuses: any response that arrives is returned as a [`RawResponse`], and
//! only a failure to get a response at all is an error.
//!
//! [`ReqwestTransport`] is the production backend. Tests and embedders can
//! supply their own.

use crate::client::ClientConfig;
use crate::error::{ApiError, Result};
use crate::types::{ErrorBody, ProgressCallback, RawResponse, RequestBody, RequestDescriptor, UploadFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Stream of body chunks for server-push responses.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Size of the chunks a multipart upload is handed to the network in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// One HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and buffer the whole response.
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse>;

    /// Send the request and stream the response body.
    ///
    /// Non-2xx statuses are reported as errors, since there is no body to stream.
    async fn open_stream(&self, request: &RequestDescriptor) -> Result<ByteStream>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the config's timeout and default headers.
    ///
    /// If the underlying client cannot be built, the error is logged and a
    /// bare `reqwest::Client` is used instead. Use [`try_new`](Self::try_new)
    /// to handle the failure.
    pub fn new(config: &ClientConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|err| {
            tracing::error!(
                error = %err,
                "failed to build HTTP client; falling back to defaults without timeout or default headers"
            );
            Self::with_client(reqwest::Client::new())
        })
    }

    /// Build a transport with the config's timeout and default headers.
    pub fn try_new(config: &ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "ignoring invalid default header"),
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &RequestDescriptor) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::File { file, progress } => {
                builder.multipart(multipart_form(file, progress.clone())?)
            }
        };

        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        let response = self.build(request)?.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    async fn open_stream(&self, request: &RequestDescriptor) -> Result<ByteStream> {
        let response = self.build(request)?.send().await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ApiError::from_status(
                status,
                ErrorBody::from_response_bytes(&body),
            ));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }
}

/// Build the multipart form for an upload, reporting progress as chunks are
/// pulled by the network.
fn multipart_form(
    file: &UploadFile,
    progress: Option<ProgressCallback>,
) -> Result<reqwest::multipart::Form> {
    let total = file.len() as u64;
    let part = match progress {
        Some(progress) => {
            if total == 0 {
                progress.report(1.0);
            }
            let body = reqwest::Body::wrap_stream(progress_stream(file.bytes.clone(), progress));
            reqwest::multipart::Part::stream_with_length(body, total)
        }
        None => reqwest::multipart::Part::bytes(file.bytes.to_vec()),
    };

    let part = part
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| ApiError::InvalidRequest(format!("bad content type: {e}")))?;

    Ok(reqwest::multipart::Form::new().part(file.field_name.clone(), part))
}

/// Split `bytes` into chunks, reporting the fraction sent as each is yielded.
fn progress_stream(
    bytes: Bytes,
    progress: ProgressCallback,
) -> impl futures::Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = bytes.len();
    let mut sent = 0usize;
    let chunks = (0..total)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(move |start| bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
        .collect::<Vec<_>>();

    stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        progress.report(sent as f64 / total as f64);
        Ok(chunk)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_try_new_skips_invalid_default_headers() {
        let mut config = ClientConfig::default();
        config
            .default_headers
            .push(("bad header".to_string(), "x".to_string()));
        assert!(ReqwestTransport::try_new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_progress_stream_reports_fractions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let bytes = Bytes::from(vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10]);

        let chunks: Vec<Bytes> = progress_stream(bytes, ProgressCallback::new(move |f| sink.lock().push(f)))
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 10);
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }
}
