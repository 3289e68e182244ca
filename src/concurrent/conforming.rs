//! Subscriber-side enforcement of the signal contract.
//!
//! Wraps a downstream subscriber and checks every signal the upstream delivers:
//! `on_next` without outstanding demand cancels the upstream and fails the
//! subscription with [`ErrorKind::ProtocolViolation`](crate::error::ErrorKind);
//! signals after a terminal are dropped; a second `on_subscribe` is cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::concurrent::publisher::Publisher;
use crate::concurrent::subscriber::{add_demand, Subscriber, Subscription, UNBOUNDED};
use crate::error::Error;

/// Publisher returned by [`PublisherExt::conform`](crate::concurrent::PublisherExt::conform).
#[derive(Debug, Clone)]
pub struct ConformingPublisher<P> {
    source: P,
}

impl<P> ConformingPublisher<P> {
    pub(crate) fn new(source: P) -> Self {
        Self { source }
    }
}

impl<T, P> Publisher<T> for ConformingPublisher<P>
where
    T: Send + 'static,
    P: Publisher<T>,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.source.subscribe(Box::new(Conforming::new(subscriber)));
    }
}

/// Demand-tracking view of the upstream subscription handed to the downstream.
struct TrackedSubscription {
    upstream: Arc<dyn Subscription>,
    outstanding: AtomicU64,
}

impl TrackedSubscription {
    fn try_consume(&self) -> bool {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| match d {
                0 => None,
                UNBOUNDED => Some(UNBOUNDED),
                d => Some(d - 1),
            })
            .is_ok()
    }
}

impl Subscription for TrackedSubscription {
    fn request(&self, n: u64) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| Some(add_demand(d, n)));
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.cancel();
    }
}

/// Contract-checking subscriber wrapper.
pub struct Conforming<T> {
    downstream: Box<dyn Subscriber<T>>,
    subscription: Option<Arc<TrackedSubscription>>,
    terminated: bool,
}

impl<T> Conforming<T> {
    pub fn new(downstream: Box<dyn Subscriber<T>>) -> Self {
        Self {
            downstream,
            subscription: None,
            terminated: false,
        }
    }

    fn violate(&mut self, message: &str) {
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
        self.terminated = true;
        tracing::warn!(violation = message, "Reactive protocol violation");
        self.downstream.on_error(Error::protocol_violation(message));
    }
}

impl<T: Send> Subscriber<T> for Conforming<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.subscription.is_some() || self.terminated {
            tracing::warn!("Duplicate on_subscribe, cancelling the new subscription");
            subscription.cancel();
            return;
        }
        let tracked = Arc::new(TrackedSubscription {
            upstream: subscription,
            outstanding: AtomicU64::new(0),
        });
        self.subscription = Some(tracked.clone());
        self.downstream.on_subscribe(tracked);
    }

    fn on_next(&mut self, item: T) {
        if self.terminated {
            return;
        }
        let verdict = match &self.subscription {
            None => Err("on_next before on_subscribe"),
            Some(subscription) if subscription.try_consume() => Ok(()),
            Some(_) => Err("on_next without outstanding demand"),
        };
        match verdict {
            Ok(()) => self.downstream.on_next(item),
            Err(violation) => self.violate(violation),
        }
    }

    fn on_error(&mut self, error: Error) {
        if std::mem::replace(&mut self.terminated, true) {
            return;
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if std::mem::replace(&mut self.terminated, true) {
            return;
        }
        self.downstream.on_complete();
    }
}
