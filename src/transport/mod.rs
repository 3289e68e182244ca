//! Transport subsystem: turning a filtered service into a listening server.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → acceptor.rs (ConnectionAcceptor chain, may close the connection)
//!     → connection.rs (ID, lifecycle tracking)
//!     → binder.rs (hyper HTTP/1 driver → HttpService::handle on the I/O thread)
//!
//! Shutdown:
//!     ServerContext::close() → stop accepting → graceful per-connection shutdown
//!     → closed() resolves
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The HTTP layer only sees [`ServerBinder`]; hyper stays behind it

pub mod acceptor;
pub mod binder;
pub mod connection;
pub mod context;
pub mod listener;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::concurrent::Single;
use crate::config::ListenerConfig;
use crate::execution::ExecutionContext;
use crate::http::service::HttpService;

pub use acceptor::{acceptor_fn, ConnectionAcceptor, ConnectionInfo, FnAcceptor};
pub use binder::HyperServerBinder;
pub use connection::{ConnectionId, ConnectionTracker};
pub use context::ServerContext;

/// The bind primitive the server builder hands its finished pipeline to.
pub trait ServerBinder: Send + Sync {
    /// Start serving `service` on `address`. The returned `Single` completes once the
    /// server is accepting connections.
    fn bind(
        &self,
        execution_context: ExecutionContext,
        config: ListenerConfig,
        address: SocketAddr,
        acceptor: Option<Arc<dyn ConnectionAcceptor>>,
        service: Arc<dyn HttpService>,
        drain_request_payload_body: bool,
    ) -> Single<ServerContext>;
}
