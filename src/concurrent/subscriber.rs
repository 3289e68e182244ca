//! The single-subscriber signal contract.
//!
//! A [`Subscriber`] receives exactly one `on_subscribe`, then zero or more `on_next`
//! (never more than it requested), then at most one of `on_error` / `on_complete`.
//! Nothing is delivered after a terminal signal.

use std::sync::Arc;

use crate::error::Error;

/// Demand value meaning "no limit". Demand saturates at this value.
pub const UNBOUNDED: u64 = u64::MAX;

/// Handle for outstanding demand and cancellation, owned by the subscriber that
/// received it in `on_subscribe`.
pub trait Subscription: Send + Sync {
    /// Ask for `n` more items. `n == 0` is a protocol violation the source reports
    /// through `on_error`.
    fn request(&self, n: u64);

    /// Stop delivery and release the source. Idempotent.
    fn cancel(&self);
}

/// Consumer of a single subscription.
///
/// Signals for one subscription are never delivered concurrently. Sources must not
/// deliver signals re-entrantly from inside [`Subscription::request`]; they record the
/// demand and keep emitting from their own drain loop instead.
pub trait Subscriber<T>: Send {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);
    fn on_next(&mut self, item: T);
    fn on_error(&mut self, error: Error);
    fn on_complete(&mut self);
}

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        (**self).on_subscribe(subscription)
    }

    fn on_next(&mut self, item: T) {
        (**self).on_next(item)
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }
}

/// Subscription for sources that terminate without emitting.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}

/// Saturating demand addition.
pub fn add_demand(current: u64, n: u64) -> u64 {
    current.saturating_add(n)
}
