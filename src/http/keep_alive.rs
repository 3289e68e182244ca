//! Connection persistence as declared by the request.

use axum::http::{header, HeaderMap, HeaderValue, Version};

/// What a response must say about the connection it is sent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpKeepAlive {
    /// Persistent by protocol default, no header needed.
    KeepAlive,
    /// Persistent only because the request asked; the response must confirm it.
    KeepAliveAddHeader,
    /// The connection closes after this response; the response must say so.
    CloseAddHeader,
}

impl HttpKeepAlive {
    /// Policy for the response to a request with this version and headers.
    pub fn response_keep_alive(version: Version, headers: &HeaderMap) -> Self {
        match version {
            Version::HTTP_11 if has_connection_token(headers, "close") => HttpKeepAlive::CloseAddHeader,
            Version::HTTP_11 => HttpKeepAlive::KeepAlive,
            Version::HTTP_10 | Version::HTTP_09 if has_connection_token(headers, "keep-alive") => {
                HttpKeepAlive::KeepAliveAddHeader
            }
            Version::HTTP_10 | Version::HTTP_09 => HttpKeepAlive::CloseAddHeader,
            _ => HttpKeepAlive::KeepAlive,
        }
    }

    pub fn is_keep_alive(self) -> bool {
        !matches!(self, HttpKeepAlive::CloseAddHeader)
    }

    /// Set the `connection` header on a response if this policy requires one.
    ///
    /// A `connection: close` the service already set is never downgraded.
    pub fn add_connection_header_if_necessary(self, headers: &mut HeaderMap) {
        match self {
            HttpKeepAlive::KeepAlive => {}
            HttpKeepAlive::KeepAliveAddHeader => {
                if !has_connection_token(headers, "close") {
                    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
                }
            }
            HttpKeepAlive::CloseAddHeader => {
                headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
            }
        }
    }
}

fn has_connection_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(token))
}
