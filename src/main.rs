//! offload-http demo server.
//!
//! A JSON echo service behind two filters:
//!
//! ```text
//! client ──▶ keep-alive ─▶ exception mapper ─▶ payload-size guard   (I/O thread)
//!                                               │
//!                                        offload boundary
//!                                               ▼
//!                                         access log ─▶ echo      (worker thread)
//! ```
//!
//! POST a JSON document and it comes back wrapped with the request ID. A body that is
//! not JSON answers 415, one above `--max-payload-bytes` answers 413.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, StatusCode};
use clap::Parser;
use serde_json::json;

use offload_http::concurrent::Single;
use offload_http::config::{load_config, ServerConfig};
use offload_http::error::Error;
use offload_http::execution::{is_worker_thread, HttpExecutionStrategy};
use offload_http::http::{
    filter_fn, service_fn, HttpService, HttpServiceContext, Request, RequestExt, Response, ResponseFactory,
};
use offload_http::observability::{init_logging, init_metrics};
use offload_http::HttpServerBuilder;

#[derive(Parser)]
#[command(name = "offload-http")]
#[command(about = "JSON echo server demonstrating execution offloading", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest request body accepted, in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    max_payload_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("offload-http v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: std::net::SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let max_payload_bytes = cli.max_payload_bytes;
    let server = HttpServerBuilder::from_config(&config)?
        .append_non_offloading_service_filter(
            filter_fn(move |ctx: &HttpServiceContext, request: Request, responses: &ResponseFactory, next: &Arc<dyn HttpService>| {
                payload_guard(max_payload_bytes, ctx, request, responses, next)
            })
            .with_required_offloads(HttpExecutionStrategy::offload_none()),
        )?
        .append_service_filter(filter_fn(access_log))
        .listen(service_fn(echo))
        .await?;

    tracing::info!(address = %server.listen_address(), "Listening for connections");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            server.close().await?;
        }
        _ = server.closed() => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Refuses oversized payloads from the declared length alone, before any offload.
fn payload_guard(
    limit: u64,
    ctx: &HttpServiceContext,
    request: Request,
    responses: &ResponseFactory,
    next: &Arc<dyn HttpService>,
) -> Single<Response> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(length) if length > limit => {
            tracing::debug!(length, limit, "Payload too large");
            Single::succeeded(responses.new_response(StatusCode::PAYLOAD_TOO_LARGE))
        }
        _ => next.handle(ctx, request, responses),
    }
}

fn access_log(
    ctx: &HttpServiceContext,
    request: Request,
    responses: &ResponseFactory,
    next: &Arc<dyn HttpService>,
) -> Single<Response> {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let connection = ctx.connection_id();
    next.handle(ctx, request, responses).map(move |response| {
        tracing::info!(
            connection_id = %connection,
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_us = started.elapsed().as_micros() as u64,
            worker = is_worker_thread(),
            "Request served"
        );
        response
    })
}

fn echo(_ctx: &HttpServiceContext, request: Request, responses: &ResponseFactory) -> Single<Response> {
    let responses = *responses;
    Single::new(async move {
        let request_id = request.request_id().map(|id| id.to_string());
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .map_err(|e| Error::transport(format!("failed to read request body: {e}")))?;
        let payload: serde_json::Value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        responses.json(
            StatusCode::OK,
            &json!({
                "request_id": request_id,
                "echo": payload,
            }),
        )
    })
}
