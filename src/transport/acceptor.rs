//! Connection acceptors: decide whether a freshly accepted connection is served.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::concurrent::Single;
use crate::error::Error;
use crate::transport::connection::ConnectionId;

/// What an acceptor knows about a connection before any request is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub local_address: SocketAddr,
    pub remote_address: SocketAddr,
}

/// Gate run once per connection. A failed `Single` closes the connection.
pub trait ConnectionAcceptor: Send + Sync + 'static {
    fn accept(&self, info: &ConnectionInfo) -> Single<()>;
}

impl<A: ConnectionAcceptor + ?Sized> ConnectionAcceptor for Arc<A> {
    fn accept(&self, info: &ConnectionInfo) -> Single<()> {
        (**self).accept(info)
    }
}

/// Synchronous acceptor backed by a closure. See [`acceptor_fn`].
pub struct FnAcceptor<F> {
    f: F,
}

pub fn acceptor_fn<F>(f: F) -> FnAcceptor<F>
where
    F: Fn(&ConnectionInfo) -> Result<(), Error> + Send + Sync + 'static,
{
    FnAcceptor { f }
}

impl<F> ConnectionAcceptor for FnAcceptor<F>
where
    F: Fn(&ConnectionInfo) -> Result<(), Error> + Send + Sync + 'static,
{
    fn accept(&self, info: &ConnectionInfo) -> Single<()> {
        match (self.f)(info) {
            Ok(()) => Single::succeeded(()),
            Err(error) => Single::failed(error),
        }
    }
}

/// Runs `first`, then `second` only if `first` accepted.
pub(crate) struct AppendedAcceptor {
    first: Arc<dyn ConnectionAcceptor>,
    second: Arc<dyn ConnectionAcceptor>,
}

impl AppendedAcceptor {
    pub(crate) fn new(first: Arc<dyn ConnectionAcceptor>, second: Arc<dyn ConnectionAcceptor>) -> Self {
        Self { first, second }
    }
}

impl ConnectionAcceptor for AppendedAcceptor {
    fn accept(&self, info: &ConnectionInfo) -> Single<()> {
        let first = self.first.accept(info);
        let second = self.second.clone();
        let info = *info;
        Single::new(async move {
            first.await?;
            second.accept(&info).await
        })
    }
}
