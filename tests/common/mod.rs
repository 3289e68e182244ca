//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use offload_http::concurrent::Single;
use offload_http::config::ExecutionConfig;
use offload_http::error::Error;
use offload_http::execution::{HttpExecutionStrategy, WorkerExecutor};
use offload_http::http::{
    filter_fn, service_fn, FnFilterFactory, HttpService, HttpServiceContext, Request, Response, ResponseFactory,
};
use offload_http::{HttpServerBuilder, ServerContext};

/// Builder on an ephemeral loopback port with a small, named worker pool.
pub fn server_builder(worker_thread_name: &str) -> HttpServerBuilder {
    let executor = WorkerExecutor::new(&ExecutionConfig {
        worker_threads: 2,
        worker_thread_name: worker_thread_name.to_string(),
        ..ExecutionConfig::default()
    })
    .unwrap();
    HttpServerBuilder::new("127.0.0.1:0".parse().unwrap()).executor(Arc::new(executor))
}

/// Bind `service` and return the running server.
pub async fn start<S: HttpService>(builder: HttpServerBuilder, service: S) -> ServerContext {
    builder.listen(service).await.expect("server failed to bind")
}

pub fn url(server: &ServerContext, path: &str) -> String {
    format!("http://{}{}", server.listen_address(), path)
}

/// Parses the body as JSON and echoes it back; non-JSON fails with `Serialization`.
pub fn json_echo_service() -> impl HttpService {
    service_fn(|_: &HttpServiceContext, request: Request, responses: &ResponseFactory| {
        let responses = *responses;
        Single::new(async move {
            let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .map_err(|e| Error::transport(e.to_string()))?;
            let value: serde_json::Value = serde_json::from_slice(&bytes)?;
            responses.json(StatusCode::OK, &value)
        })
    })
}

/// Answers 200 with an empty body and needs no offloads.
pub fn ok_service() -> impl HttpService {
    service_fn(|_: &HttpServiceContext, _: Request, responses: &ResponseFactory| {
        Single::succeeded(responses.ok())
    })
    .with_required_offloads(HttpExecutionStrategy::offload_none())
}

/// Filter that records the current thread name into response header `name`.
pub fn thread_name_filter(
    name: &'static str,
) -> FnFilterFactory<
    impl Fn(&HttpServiceContext, Request, &ResponseFactory, &Arc<dyn HttpService>) -> Single<Response>
        + Send
        + Sync
        + 'static,
> {
    filter_fn(move |ctx: &HttpServiceContext, request: Request, responses: &ResponseFactory, next: &Arc<dyn HttpService>| {
        let thread = current_thread_name();
        next.handle(ctx, request, responses).map(move |mut response| {
            response
                .headers_mut()
                .insert(name, thread.parse().expect("thread name is a valid header"));
            response
        })
    })
}

pub fn current_thread_name() -> String {
    std::thread::current().name().unwrap_or("unnamed").to_string()
}

/// Write `request` on a fresh connection and read until the peer closes or `timeout`
/// passes. Returns whatever was received.
pub async fn raw_exchange(addr: SocketAddr, request: &str, timeout: Duration) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
    })
    .await;
    String::from_utf8_lossy(&received).into_owned()
}

/// Whether the connection is closed by the peer within `timeout`.
pub async fn peer_closes(stream: &mut TcpStream, timeout: Duration) -> bool {
    let mut buf = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => return true,
            Ok(Ok(_)) => continue,
            Err(_) => return false,
        }
    }
}
