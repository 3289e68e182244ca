//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, offloads, mapped errors, connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_server_requests_total` (counter): responses written, by status
//! - `http_server_offloaded_total` (counter): requests the offload boundary moved to a worker
//! - `http_server_mapped_errors_total` (counter): failures turned into responses, by kind
//! - `http_server_connections_total` (counter): accepted connections
//! - `http_server_rejected_connections_total` (counter): connections refused by an acceptor
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it
//!   is a no-op, so libraries and tests never need to set one up

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{Error, ErrorKind};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Error> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::illegal_configuration(format!("failed to install metrics exporter: {e}")))?;

    ::metrics::describe_counter!("http_server_requests_total", "Responses written, by status code");
    ::metrics::describe_counter!(
        "http_server_offloaded_total",
        "Requests moved from an I/O thread to the worker executor"
    );
    ::metrics::describe_counter!(
        "http_server_mapped_errors_total",
        "Service failures converted into error responses, by kind"
    );
    ::metrics::describe_counter!("http_server_connections_total", "Accepted connections");
    ::metrics::describe_counter!(
        "http_server_rejected_connections_total",
        "Connections refused by a connection acceptor"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16) {
    ::metrics::counter!("http_server_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_offload() {
    ::metrics::counter!("http_server_offloaded_total").increment(1);
}

pub fn record_mapped_error(kind: ErrorKind) {
    ::metrics::counter!("http_server_mapped_errors_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_connection() {
    ::metrics::counter!("http_server_connections_total").increment(1);
}

pub fn record_rejected_connection() {
    ::metrics::counter!("http_server_rejected_connections_total").increment(1);
}
