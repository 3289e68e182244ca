//! Contexts, requests and small services for HTTP unit tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::HeaderValue;
use futures_util::future::BoxFuture;

use crate::concurrent::Single;
use crate::error::Error;
use crate::execution::{Executor, ExecutionContext, HttpExecutionStrategy, ThreadAwareIoExecutor};
use crate::http::context::HttpServiceContext;
use crate::http::filter::{filter_fn, FnFilterFactory};
use crate::http::request::Request;
use crate::http::response::{Response, ResponseFactory};
use crate::http::service::{service_fn, HttpService};
use crate::transport::connection::ConnectionId;

/// Runs tasks on the test's own runtime.
pub(crate) struct SpawnExecutor;

impl Executor for SpawnExecutor {
    fn execute(&self, task: BoxFuture<'static, ()>) -> Result<(), Error> {
        tokio::spawn(task);
        Ok(())
    }
}

pub(crate) fn test_execution_context() -> ExecutionContext {
    ExecutionContext::new(
        Arc::new(SpawnExecutor),
        Arc::new(ThreadAwareIoExecutor),
        HttpExecutionStrategy::offload_none(),
    )
}

pub(crate) fn test_context() -> HttpServiceContext {
    let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    let remote: SocketAddr = "127.0.0.1:50000".parse().unwrap();
    HttpServiceContext::new(ConnectionId::new(), local, remote, test_execution_context())
}

pub(crate) fn get(path: &str) -> Request {
    axum::http::Request::builder()
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// Answers 200 without needing any offload.
pub(crate) fn ok_service() -> Arc<dyn HttpService> {
    Arc::new(
        service_fn(|_: &HttpServiceContext, _: Request, responses: &ResponseFactory| {
            Single::succeeded(responses.ok())
        })
        .with_required_offloads(HttpExecutionStrategy::offload_none()),
    )
}

/// Fails asynchronously with `error`.
pub(crate) fn failing_service(error: Error) -> Arc<dyn HttpService> {
    Arc::new(service_fn(move |_: &HttpServiceContext, _: Request, _: &ResponseFactory| {
        Single::failed(error.clone())
    }))
}

/// Panics with `error` as soon as it is called.
pub(crate) fn throwing_service(error: Error) -> Arc<dyn HttpService> {
    Arc::new(service_fn(
        move |_: &HttpServiceContext, _: Request, _: &ResponseFactory| -> Single<Response> {
            std::panic::panic_any(error.clone())
        },
    ))
}

/// Sets a response header on the way back.
pub(crate) fn header_filter(
    name: &'static str,
    value: &'static str,
) -> FnFilterFactory<
    impl Fn(&HttpServiceContext, Request, &ResponseFactory, &Arc<dyn HttpService>) -> Single<Response>
        + Send
        + Sync
        + 'static,
> {
    filter_fn(move |ctx: &HttpServiceContext, request: Request, responses: &ResponseFactory, next: &Arc<dyn HttpService>| {
        next.handle(ctx, request, responses).map(move |mut response| {
            response.headers_mut().insert(name, HeaderValue::from_static(value));
            response
        })
    })
}
