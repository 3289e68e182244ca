//! Per-connection context handed to every service and filter invocation.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::execution::ExecutionContext;
use crate::transport::connection::ConnectionId;

struct Inner {
    connection_id: ConnectionId,
    local_address: SocketAddr,
    remote_address: SocketAddr,
    execution_context: ExecutionContext,
}

/// Cheap-to-clone view of the connection a request arrived on.
#[derive(Clone)]
pub struct HttpServiceContext {
    inner: Arc<Inner>,
}

impl HttpServiceContext {
    pub fn new(
        connection_id: ConnectionId,
        local_address: SocketAddr,
        remote_address: SocketAddr,
        execution_context: ExecutionContext,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection_id,
                local_address,
                remote_address,
                execution_context,
            }),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection_id
    }

    pub fn local_address(&self) -> SocketAddr {
        self.inner.local_address
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.inner.execution_context
    }
}

impl std::fmt::Display for HttpServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} L:{} - R:{}]",
            self.inner.connection_id, self.inner.local_address, self.inner.remote_address
        )
    }
}

impl std::fmt::Debug for HttpServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceContext")
            .field("connection_id", &self.inner.connection_id)
            .field("local_address", &self.inner.local_address)
            .field("remote_address", &self.inner.remote_address)
            .finish()
    }
}
