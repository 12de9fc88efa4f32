#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # studio-http: request pipeline for the studio API
//!
//! Every request a studio client makes goes through one pipeline: a base URL
//! and default headers, a per-attempt request id and API version, bearer
//! authentication, retry of transient failures, a transparent session refresh
//! on `401`, a reference-counted loading indicator and user-facing error
//! notifications. Responses come back as a uniform [`Envelope`].
//!
//! ## Overview
//!
//! ```text
//!  ApiClient ──▶ HttpClient ──▶ middleware chain ──▶ Transport ──▶ network
//!  (pagination,   (typed verbs,   (notify, loading,     (reqwest)
//!   batch, SSE,    upload,         refresh, retry,
//!   polling)       download)       tag, auth, cache)
//! ```
//!
//! Process-wide state (session, loading counter, retry ledger, in-flight
//! refresh) lives in an explicit [`HttpContext`] shared by the client and its
//! middleware. UI concerns reach the embedder through the [`Presenter`] trait.
//!
//! ## Client Usage
//!
//! ```ignore
//! use studio_http::{ApiClient, Envelope, HttpClient, Pagination, RequestOptions};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = ApiClient::new(HttpClient::new());
//!
//!     let page = api
//!         .paginated_get::<Value, _>("/images", &Pagination::page(2), &json!({ "tag": "portrait" }))
//!         .await;
//!
//!     let synth: Envelope<Value> = api
//!         .post("/voice/synthesize", &json!({ "text": "hello" }), RequestOptions::new().with_retries(2))
//!         .await;
//!
//!     if let Envelope::Failure(error) = synth {
//!         eprintln!("{}: {}", error.code, error.message);
//!     }
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - Envelopes, pagination, request descriptors and options
//! - **[error]** - Error taxonomy and result handling
//! - **[client]** - Transport client, request wrapper, streams and polling
//! - **[middleware]** - The request/response middleware chain
//! - **[state]** - Shared context: session, loading counter, retry ledger, presenter
//! - **[protocol]** - Header constants, status messages and notification styles

pub mod client;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod state;
pub mod types;

pub use client::{ApiClient, ClientConfig, HttpClient, Poller, StreamCallbacks, Transport};
pub use error::{ApiError, ErrorClass, Result};
pub use middleware::{Middleware, MiddlewareChain, Next};
pub use state::{AuthSession, HttpContext, Presenter, SessionStore};
pub use types::{
    Envelope, ErrorBody, Paginated, Pagination, RequestDescriptor, RequestOptions, UploadFile,
};

#[cfg(test)]
mod tests;
