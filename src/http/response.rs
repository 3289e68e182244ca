//! Response type and the factory services build responses with.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use serde::Serialize;

use crate::error::Error;

/// Response type every service and filter produces.
pub type Response = axum::http::Response<Body>;

/// Builds responses on behalf of a service. Stateless and freely copied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFactory;

impl ResponseFactory {
    /// Empty-bodied response with `status`.
    pub fn new_response(&self, status: StatusCode) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        response
    }

    pub fn ok(&self) -> Response {
        self.new_response(StatusCode::OK)
    }

    /// Response whose body is `value` serialized as JSON.
    ///
    /// Serialization failures surface as `ErrorKind::Serialization`.
    pub fn json<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<Response, Error> {
        let bytes = serde_json::to_vec(value)?;
        let length = bytes.len();
        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        Ok(response)
    }
}
