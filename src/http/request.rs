//! Request type and request-scoped helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as soon as the transport hands a request over
//! - Expose request properties filters commonly branch on
//!
//! # Design Decisions
//! - Request ID travels as a request extension, not a header, so user services
//!   cannot spoof it
//! - Requests are plain `http::Request`s over axum's type-erased body

use axum::body::Body;
use hyper::body::Body as _;
use uuid::Uuid;

/// Request type every service and filter handles.
pub type Request = axum::http::Request<Body>;

/// Header a client may use to correlate its own logs with ours.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier attached to every request the transport accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convenience accessors on [`Request`].
pub trait RequestExt {
    /// ID assigned by the transport, if the request came through one.
    fn request_id(&self) -> Option<RequestId>;

    /// Whether the request carries body bytes that still have to be read.
    fn has_payload(&self) -> bool;
}

impl RequestExt for Request {
    fn request_id(&self) -> Option<RequestId> {
        self.extensions().get::<RequestId>().copied()
    }

    fn has_payload(&self) -> bool {
        !self.body().is_end_stream()
    }
}
