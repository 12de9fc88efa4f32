//! Studio HTTP client implementation.
//!
//! This module provides the transport client and the request wrapper built on
//! it, enabling callers to:
//!
//! - **Issue typed requests** that come back as envelopes
//! - **Retry** transient failures with capped exponential backoff
//! - **Refresh sessions** transparently on 401
//! - **Upload and download files** with progress reporting
//! - **Consume server-sent events** and **poll** endpoints on an interval
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── api          - ApiClient request wrapper
//! ├── config       - Client configuration
//! ├── fetch        - HttpClient and the typed verbs
//! ├── parser       - Incremental text/event-stream parser
//! ├── poll         - Interval polling controller
//! ├── subscription - Event streams
//! ├── transport    - Transport trait and the reqwest backend
//! └── utils        - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HttpClient`] | Runs requests through the middleware chain |
//! | [`ApiClient`] | Pagination, batch, upload, download, streams, polling |
//! | [`Transport`] | One HTTP exchange; [`ReqwestTransport`] in production |
//! | [`SseParser`] | Streaming event parser |
//! | [`Poller`] | Interval polling controller |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use studio_http::client::{ApiClient, ClientConfig, HttpClient};
//!
//! // Environment configuration
//! let client = HttpClient::new();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     request_timeout_ms: 60_000,
//!     retry_delay_ms: 500,
//!     ..Default::default()
//! };
//! let api = ApiClient::new(HttpClient::with_config(config));
//! ```
//!
//! ## Parsing Events
//!
//! ```
//! use studio_http::client::SseParser;
//!
//! let mut parser = SseParser::new();
//! assert!(parser.feed(b"data: 4").is_empty());
//! let events = parser.feed(b"2\n\n");
//! assert_eq!(events[0].data, "42");
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use studio_http::client::{is_retryable_status, retry_backoff};
//! use std::time::Duration;
//!
//! // Check if status is retryable
//! assert!(is_retryable_status(503));
//! assert!(!is_retryable_status(404));
//!
//! // Calculate backoff delay
//! assert_eq!(retry_backoff(2, 1_000, 10_000), Duration::from_millis(2_000));
//! assert_eq!(retry_backoff(6, 1_000, 10_000), Duration::from_millis(10_000));
//! ```

mod api;
mod config;
mod fetch;
mod parser;
mod poll;
mod subscription;
mod transport;
mod utils;

pub use api::ApiClient;
pub use config::{ClientConfig, BASE_URL_ENV, DEFAULT_BASE_URL, TIMEOUT_ENV};
pub use fetch::{HttpClient, HttpClientBuilder};
pub use parser::{SseEvent, SseParser};
pub use poll::Poller;
pub use subscription::{event_request, EventStream, EventSubscription, StreamCallbacks};
pub use transport::{ByteStream, ReqwestTransport, Transport};
pub use utils::*;
