//! Handle on a bound server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use crate::concurrent::Single;
use crate::lifecycle::Shutdown;
use crate::transport::connection::ConnectionTracker;

struct Inner {
    listen_address: SocketAddr,
    shutdown: Shutdown,
    connections: ConnectionTracker,
    closed: watch::Receiver<bool>,
}

/// Returned by a successful bind. Clones refer to the same server.
#[derive(Clone)]
pub struct ServerContext {
    inner: Arc<Inner>,
}

impl ServerContext {
    /// `closed` must flip to `true` once the server has fully stopped.
    pub fn new(
        listen_address: SocketAddr,
        shutdown: Shutdown,
        connections: ConnectionTracker,
        closed: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                listen_address,
                shutdown,
                connections,
                closed,
            }),
        }
    }

    /// Address the server actually listens on (resolves port 0).
    pub fn listen_address(&self) -> SocketAddr {
        self.inner.listen_address
    }

    pub fn active_connections(&self) -> u64 {
        self.inner.connections.active_count()
    }

    /// Stop accepting, gracefully shut down open connections, and complete once the
    /// server is closed.
    pub fn close(&self) -> Single<()> {
        tracing::info!(address = %self.inner.listen_address, "Closing server");
        self.inner.shutdown.trigger();
        self.closed()
    }

    /// Completes when the server has stopped, for whatever reason.
    pub fn closed(&self) -> Single<()> {
        let mut closed = self.inner.closed.clone();
        Single::new(async move {
            // A dropped sender means the accept loop is gone, which is closed too.
            let _ = closed.wait_for(|closed| *closed).await;
            Ok(())
        })
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("listen_address", &self.inner.listen_address)
            .field("active_connections", &self.active_connections())
            .finish()
    }
}
