//! Filters the server builder always applies around the filtered service.
//!
//! ```text
//! KeepAliveFilter → ExceptionMapperFilter → [user filters, offload boundary] → service
//! ```
//!
//! Both are stateless values built once per pipeline and need no offloading. User
//! code cannot observe or catch anything they do.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode, Uri, Version};

use crate::concurrent::Single;
use crate::error::{Error, ErrorKind};
use crate::execution::HttpExecutionStrategy;
use crate::http::context::HttpServiceContext;
use crate::http::filter::FilterFactory;
use crate::http::keep_alive::HttpKeepAlive;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseFactory};
use crate::http::service::HttpService;
use crate::observability::metrics;

/// Converts every failure of the wrapped stage into a response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionMapperFilter;

impl FilterFactory<dyn HttpService> for ExceptionMapperFilter {
    fn create(&self, next: Arc<dyn HttpService>) -> Arc<dyn HttpService> {
        Arc::new(ExceptionMapper { next })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

struct ExceptionMapper {
    next: Arc<dyn HttpService>,
}

/// Request line captured before the request is handed on.
struct RequestLine {
    method: Method,
    target: Uri,
    version: Version,
}

impl HttpService for ExceptionMapper {
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        let line = RequestLine {
            method: request.method().clone(),
            target: request.uri().clone(),
            version: request.version(),
        };
        let response = match catch_unwind(AssertUnwindSafe(|| self.next.handle(ctx, request, responses))) {
            Ok(single) => single.catch_unwind(),
            Err(panic) => Single::failed(Error::from_panic(panic)),
        };

        let ctx = ctx.clone();
        let responses = *responses;
        response.on_error_return(move |error| error_response(&error, &ctx, &line, &responses))
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Rejected => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Serialization => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(
    error: &Error,
    ctx: &HttpServiceContext,
    line: &RequestLine,
    responses: &ResponseFactory,
) -> Response {
    let status = status_for(error.kind());
    let reason = match error.kind() {
        ErrorKind::Rejected => "Task rejected by service processing",
        ErrorKind::Serialization => "Failed to deserialize or serialize",
        _ => "Unexpected failure during service processing",
    };
    tracing::error!(
        connection = %ctx,
        method = %line.method,
        target = %line.target,
        version = ?line.version,
        status = status.as_u16(),
        error = %error.report(),
        "{reason}"
    );
    metrics::record_mapped_error(error.kind());

    let mut response = responses.new_response(status);
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// Sets the `connection` header according to the request's keep-alive policy.
///
/// Sits outside [`ExceptionMapperFilter`], so the wrapped stage never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAliveFilter;

impl FilterFactory<dyn HttpService> for KeepAliveFilter {
    fn create(&self, next: Arc<dyn HttpService>) -> Arc<dyn HttpService> {
        Arc::new(KeepAlive { next })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

struct KeepAlive {
    next: Arc<dyn HttpService>,
}

impl HttpService for KeepAlive {
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        let keep_alive = HttpKeepAlive::response_keep_alive(request.version(), request.headers());
        self.next
            .handle(ctx, request, responses)
            .map(move |mut response| {
                keep_alive.add_connection_header_if_necessary(response.headers_mut());
                response
            })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

/// The fixed boundary filters, outermost first.
pub fn internal_filters() -> Vec<Arc<dyn FilterFactory<dyn HttpService>>> {
    vec![Arc::new(KeepAliveFilter), Arc::new(ExceptionMapperFilter)]
}
