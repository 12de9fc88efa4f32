//! Core request and response types.
//!
//! - [`RequestDescriptor`] describes one logical request: method, URL, body,
//!   query parameters, headers and the per-request [`RequestOptions`].
//! - [`RawResponse`] is what the transport hands back before decoding.
//! - [`Envelope`] is the uniform `{success, data | error}` wrapper returned to
//!   callers.
//! - [`Pagination`] and [`Paginated`] describe paginated list endpoints.

mod envelope;
mod pagination;
mod request;
mod response;

pub use envelope::{Envelope, ErrorBody, ErrorDetails, FieldError, DEFAULT_ERROR_MESSAGE};
pub use pagination::{Paginated, Pagination, SortOrder};
pub use request::{
    CacheMode, ProgressCallback, RequestBody, RequestDescriptor, RequestOptions, ResponseKind,
    UploadFile,
};
pub use response::RawResponse;
