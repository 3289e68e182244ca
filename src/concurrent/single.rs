//! `Single`: a lazily started computation producing exactly one value or an error.
//!
//! Backed by a boxed future, so nothing runs until the `Single` is awaited and each
//! `Single` is consumed by exactly one awaiter.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::execution::Executor;

/// See the module documentation.
#[must_use = "a Single does nothing until it is awaited"]
pub struct Single<T> {
    inner: BoxFuture<'static, Result<T, Error>>,
}

impl<T: Send + 'static> Single<T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    pub fn succeeded(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    pub fn failed(error: Error) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// Build the actual `Single` only when this one is awaited.
    pub fn defer<F>(factory: F) -> Self
    where
        F: FnOnce() -> Single<T> + Send + 'static,
    {
        Self::new(async move { factory().await })
    }

    pub fn map<U, F>(self, f: F) -> Single<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Single::new(self.inner.map(|result| result.map(f)))
    }

    /// Replace a failure with a value computed from it.
    pub fn on_error_return<F>(self, f: F) -> Single<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        Single::new(self.inner.map(|result| Ok(result.unwrap_or_else(f))))
    }

    /// On failure, continue with the `Single` produced by `fallback`.
    ///
    /// The fallback runs at most once. If it fails or panics instead of producing a
    /// `Single`, that failure is returned with the original one attached as a suppressed
    /// cause. A failure of the produced `Single` is returned as is.
    pub fn on_error_resume<F>(self, fallback: F) -> Single<T>
    where
        F: FnOnce(&Error) -> Result<Single<T>, Error> + Send + 'static,
    {
        Single::new(async move {
            match self.inner.await {
                Ok(value) => Ok(value),
                Err(cause) => match std::panic::catch_unwind(AssertUnwindSafe(|| fallback(&cause))) {
                    Ok(Ok(next)) => next.await,
                    Ok(Err(error)) => Err(error.with_suppressed(cause)),
                    Err(panic) => Err(Error::from_panic(panic).with_suppressed(cause)),
                },
            }
        })
    }

    /// Turn a panic raised while polling into an error.
    pub fn catch_unwind(self) -> Single<T> {
        Single::new(
            AssertUnwindSafe(self.inner)
                .catch_unwind()
                .map(|outcome| outcome.unwrap_or_else(|panic| Err(Error::from_panic(panic)))),
        )
    }

    /// Run this `Single` on `executor` and deliver its result back to the awaiter.
    ///
    /// A rejected submission fails with [`ErrorKind::Rejected`](crate::error::ErrorKind).
    /// Dropping the returned `Single` cancels the offloaded work.
    pub fn submit_on(self, executor: &dyn Executor) -> Single<T> {
        let (tx, rx) = oneshot::channel();
        let work = self.catch_unwind();
        let task = async move {
            let mut tx = tx;
            let outcome = tokio::select! {
                result = work => Some(result),
                _ = tx.closed() => None,
            };
            match outcome {
                Some(result) => {
                    let _ = tx.send(result);
                }
                None => tracing::trace!("Offloaded task cancelled by its subscriber"),
            }
        };

        match executor.execute(task.boxed()) {
            Ok(()) => Single::new(async move {
                rx.await
                    .unwrap_or_else(|_| Err(Error::cancelled("offloaded task dropped before completing")))
            }),
            Err(error) => Single::failed(error),
        }
    }
}

impl<T> Future for Single<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for Single<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Single")
    }
}
