//! hyper-based server binder.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop on the caller's runtime (the I/O
//!   threads)
//! - Run the connection acceptor before serving any request
//! - Serve HTTP/1.1 with hyper, handing each request to the filtered service
//! - Graceful shutdown: stop accepting, then let every connection finish
//!
//! # Design Decisions
//! - `HttpService::handle` is called synchronously from hyper's `call`, so
//!   everything before an offload boundary runs on the I/O thread
//! - Without payload draining, a response to a request whose body was not consumed
//!   is marked `connection: close`

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::Instrument;

use crate::concurrent::Single;
use crate::config::ListenerConfig;
use crate::execution::ExecutionContext;
use crate::http::context::HttpServiceContext;
use crate::http::request::{Request, RequestExt, RequestId, X_REQUEST_ID};
use crate::http::response::{Response, ResponseFactory};
use crate::http::service::HttpService;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::transport::acceptor::{ConnectionAcceptor, ConnectionInfo};
use crate::transport::connection::{ConnectionGuard, ConnectionTracker};
use crate::transport::context::ServerContext;
use crate::transport::listener::{ConnectionPermit, Listener};
use crate::transport::ServerBinder;

/// Binds servers with tokio's TCP listener and hyper's HTTP/1 connection driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperServerBinder;

impl ServerBinder for HyperServerBinder {
    fn bind(
        &self,
        execution_context: ExecutionContext,
        config: ListenerConfig,
        address: SocketAddr,
        acceptor: Option<Arc<dyn ConnectionAcceptor>>,
        service: Arc<dyn HttpService>,
        drain_request_payload_body: bool,
    ) -> Single<ServerContext> {
        Single::new(async move {
            let listener = Listener::bind(address, config.max_connections).await?;
            let listen_address = listener.local_addr()?;

            let shutdown = Shutdown::new();
            let connections = ConnectionTracker::new();
            let (closed_tx, closed_rx) = watch::channel(false);

            let server = Server {
                listen_address,
                execution_context,
                acceptor,
                service,
                drain_request_payload_body,
                shutdown: shutdown.clone(),
                connections: connections.clone(),
            };
            tokio::spawn(async move {
                server.accept_loop(listener).await;
                let _ = closed_tx.send(true);
            });

            Ok(ServerContext::new(listen_address, shutdown, connections, closed_rx))
        })
    }
}

/// Everything a connection task needs, shared by all of them.
#[derive(Clone)]
struct Server {
    listen_address: SocketAddr,
    execution_context: ExecutionContext,
    acceptor: Option<Arc<dyn ConnectionAcceptor>>,
    service: Arc<dyn HttpService>,
    drain_request_payload_body: bool,
    shutdown: Shutdown,
    connections: ConnectionTracker,
}

impl Server {
    async fn accept_loop(self, listener: Listener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.triggered() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, remote_address, permit)) => {
                    metrics::record_connection();
                    let guard = self.connections.track();
                    tokio::spawn(self.clone().serve(stream, remote_address, permit, guard));
                }
                Err(error) => {
                    tracing::warn!(%error, "Failed to accept connection");
                }
            }
        }

        drop(listener);
        tracing::info!(
            address = %self.listen_address,
            active_connections = self.connections.active_count(),
            "Stopped accepting, draining connections"
        );
        self.connections.wait_idle().await;
        tracing::info!(address = %self.listen_address, "Server closed");
    }

    async fn serve(
        self,
        stream: TcpStream,
        remote_address: SocketAddr,
        _permit: ConnectionPermit,
        guard: ConnectionGuard,
    ) {
        let info = ConnectionInfo {
            id: guard.id(),
            local_address: self.listen_address,
            remote_address,
        };
        if let Some(acceptor) = &self.acceptor {
            if let Err(error) = acceptor.accept(&info).await {
                metrics::record_rejected_connection();
                tracing::debug!(connection_id = %info.id, remote = %remote_address, %error, "Connection rejected");
                return;
            }
        }

        let ctx = HttpServiceContext::new(
            info.id,
            self.listen_address,
            remote_address,
            self.execution_context.clone(),
        );
        let adapter = HttpServiceAdapter {
            service: self.service.clone(),
            ctx,
            drain_request_payload_body: self.drain_request_payload_body,
        };

        let conn = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), TowerToHyperService::new(adapter));
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = self.shutdown.triggered() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };
        if let Err(error) = result {
            tracing::debug!(connection_id = %info.id, %error, "Connection ended with error");
        }
    }
}

/// Bridges hyper's per-request calls to an [`HttpService`].
#[derive(Clone)]
struct HttpServiceAdapter {
    service: Arc<dyn HttpService>,
    ctx: HttpServiceContext,
    drain_request_payload_body: bool,
}

impl tower::Service<axum::http::Request<Incoming>> for HttpServiceAdapter {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: axum::http::Request<Incoming>) -> Self::Future {
        let request_id = RequestId::new();
        let mut request: Request = request.map(Body::new);
        request.extensions_mut().insert(request_id);
        let close_after = !self.drain_request_payload_body && request.has_payload();

        let span = tracing::debug_span!(
            "request",
            request_id = %request_id,
            connection_id = %self.ctx.connection_id(),
            method = %request.method(),
            target = %request.uri(),
        );
        let response = span.in_scope(|| self.service.handle(&self.ctx, request, &ResponseFactory));

        async move {
            let mut response = match response.await {
                Ok(response) => response,
                Err(error) => {
                    tracing::error!(%error, "Service failure escaped the exception mapper");
                    let mut response = ResponseFactory.new_response(StatusCode::INTERNAL_SERVER_ERROR);
                    response
                        .headers_mut()
                        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                    response
                }
            };
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            if close_after {
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
            }
            metrics::record_request(response.status().as_u16());
            tracing::debug!(status = response.status().as_u16(), "Response ready");
            Ok(response)
        }
        .instrument(span)
        .boxed()
    }
}
