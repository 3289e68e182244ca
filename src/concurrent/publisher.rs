//! Cold sources and the operator entry points.
//!
//! # Responsibilities
//! - `Publisher` trait: one independent subscription per `subscribe` call
//! - Built-in sources: [`from_iter`], [`failed`], [`empty`]
//! - Operator extension trait [`PublisherExt`]
//!
//! # Design Decisions
//! - Sources own their subscriber behind a drain loop (`wip` counter): whoever
//!   increments `wip` from zero emits, everybody else only records work. This keeps
//!   `request` called from inside `on_next` from re-entering the subscriber.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::concurrent::conforming::ConformingPublisher;
use crate::concurrent::resume::ResumePublisher;
use crate::concurrent::subscriber::{add_demand, EmptySubscription, Subscriber, Subscription, UNBOUNDED};
use crate::error::Error;

/// A cold producer of zero or more items, terminated by completion or failure.
pub trait Publisher<T>: Send + Sync {
    /// Start a new, independent subscription for `subscriber`.
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>);
}

impl<T, P: Publisher<T> + ?Sized> Publisher<T> for Arc<P> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        (**self).subscribe(subscriber)
    }
}

impl<T, P: Publisher<T> + ?Sized> Publisher<T> for Box<P> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        (**self).subscribe(subscriber)
    }
}

/// Operators available on every publisher.
pub trait PublisherExt<T>: Publisher<T> + Sized {
    /// On the first failure, subscribe to the publisher produced by `fallback`.
    ///
    /// The fallback is used at most once per subscription; a failure of the fallback
    /// source reaches the subscriber directly. If `fallback` itself fails, the
    /// original failure is attached to the new one as a suppressed cause.
    fn on_error_resume<F, N>(self, fallback: F) -> ResumePublisher<Self, F>
    where
        F: Fn(&Error) -> Result<N, Error> + Send + Sync + 'static,
        N: Publisher<T> + 'static,
    {
        ResumePublisher::new(self, fallback)
    }

    /// Enforce the subscriber contract on whatever this publisher emits.
    fn conform(self) -> ConformingPublisher<Self> {
        ConformingPublisher::new(self)
    }
}

impl<T, P: Publisher<T>> PublisherExt<T> for P {}

/// Emits a clone of `items` to every subscriber, honouring demand.
pub fn from_iter<T, I>(items: I) -> FromIter<T>
where
    I: IntoIterator<Item = T>,
{
    FromIter {
        items: items.into_iter().collect(),
        terminal: None,
    }
}

/// Terminates every subscriber with `error` right after `on_subscribe`.
pub fn failed<T>(error: Error) -> Failed<T> {
    Failed {
        error,
        _item: std::marker::PhantomData,
    }
}

/// Completes every subscriber right after `on_subscribe`.
pub fn empty<T>() -> Empty<T> {
    Empty {
        _item: std::marker::PhantomData,
    }
}

/// See [`from_iter`].
#[derive(Debug, Clone)]
pub struct FromIter<T> {
    items: Vec<T>,
    terminal: Option<Error>,
}

impl<T> FromIter<T> {
    /// Fail with `error` after the last item instead of completing.
    pub fn then_fail(mut self, error: Error) -> Self {
        self.terminal = Some(error);
        self
    }
}

impl<T> Publisher<T> for FromIter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        let subscription = Arc::new(IterSubscription {
            emitter: Mutex::new(IterEmitter {
                items: self.items.iter().cloned().collect(),
                terminal: self.terminal.clone(),
                subscriber: None,
            }),
            demand: AtomicU64::new(0),
            // Held by `subscribe` until `on_subscribe` returns.
            wip: AtomicUsize::new(1),
            cancelled: AtomicBool::new(false),
            invalid_request: AtomicBool::new(false),
        });

        subscriber.on_subscribe(subscription.clone());
        subscription.lock_emitter().subscriber = Some(subscriber);
        subscription.drain();
    }
}

struct IterEmitter<T> {
    items: VecDeque<T>,
    terminal: Option<Error>,
    subscriber: Option<Box<dyn Subscriber<T>>>,
}

struct IterSubscription<T> {
    emitter: Mutex<IterEmitter<T>>,
    demand: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
    invalid_request: AtomicBool,
}

impl<T> IterSubscription<T> {
    fn lock_emitter(&self) -> std::sync::MutexGuard<'_, IterEmitter<T>> {
        self.emitter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.drain();
        }
    }

    /// Caller owns `wip`.
    fn drain(&self) {
        let mut missed = 1;
        loop {
            self.emit();
            let previous = self.wip.fetch_sub(missed, Ordering::AcqRel);
            missed = previous - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn try_consume(&self) -> bool {
        self.demand
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| match d {
                0 => None,
                UNBOUNDED => Some(UNBOUNDED),
                d => Some(d - 1),
            })
            .is_ok()
    }

    fn emit(&self) {
        let mut emitter = self.lock_emitter();
        loop {
            if emitter.subscriber.is_none() {
                return;
            }
            if self.cancelled.load(Ordering::Acquire) {
                emitter.subscriber = None;
                emitter.items.clear();
                return;
            }
            if self.invalid_request.load(Ordering::Acquire) {
                if let Some(mut subscriber) = emitter.subscriber.take() {
                    subscriber.on_error(Error::protocol_violation("request(0) is not a valid demand"));
                }
                return;
            }
            if emitter.items.is_empty() {
                let terminal = emitter.terminal.take();
                if let Some(mut subscriber) = emitter.subscriber.take() {
                    match terminal {
                        Some(error) => subscriber.on_error(error),
                        None => subscriber.on_complete(),
                    }
                }
                return;
            }
            if !self.try_consume() {
                return;
            }
            if let Some(item) = emitter.items.pop_front() {
                if let Some(subscriber) = emitter.subscriber.as_mut() {
                    subscriber.on_next(item);
                }
            }
        }
    }
}

impl<T: Send> Subscription for IterSubscription<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.invalid_request.store(true, Ordering::Release);
        } else {
            let _ = self
                .demand
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| Some(add_demand(d, n)));
        }
        self.signal();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.signal();
        }
    }
}

/// See [`failed`].
#[derive(Debug)]
pub struct Failed<T> {
    error: Error,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T> Publisher<T> for Failed<T> {
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_error(self.error.clone());
    }
}

/// See [`empty`].
#[derive(Debug)]
pub struct Empty<T> {
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T> Publisher<T> for Empty<T> {
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent::test_util::Recorder;
    use crate::error::ErrorKind;

    #[test]
    fn from_iter_honours_demand() {
        let recorder = Recorder::new(2);
        from_iter(vec![1, 2, 3, 4, 5]).subscribe(recorder.subscriber());

        assert_eq!(recorder.items(), vec![1, 2]);
        assert!(!recorder.is_terminated());

        recorder.request(10);
        assert_eq!(recorder.items(), vec![1, 2, 3, 4, 5]);
        assert!(recorder.is_completed());
    }

    #[test]
    fn from_iter_is_replayable() {
        let source = from_iter(vec!["a", "b"]);
        let first = Recorder::new(UNBOUNDED);
        let second = Recorder::new(UNBOUNDED);

        source.subscribe(first.subscriber());
        source.subscribe(second.subscriber());

        assert_eq!(first.items(), vec!["a", "b"]);
        assert_eq!(second.items(), vec!["a", "b"]);
    }

    #[test]
    fn request_from_on_next_does_not_deadlock() {
        let recorder = Recorder::new(1).request_on_next(1);
        from_iter(0..100).subscribe(recorder.subscriber());

        assert_eq!(recorder.items().len(), 100);
        assert!(recorder.is_completed());
    }

    #[test]
    fn zero_request_is_a_protocol_violation() {
        let recorder = Recorder::new(0);
        from_iter(vec![1]).subscribe(recorder.subscriber());
        recorder.request(0);

        let error = recorder.error().expect("error expected");
        assert_eq!(error.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn cancel_stops_emission() {
        let recorder = Recorder::new(1);
        from_iter(vec![1, 2, 3]).subscribe(recorder.subscriber());
        recorder.cancel();
        recorder.request(5);

        assert_eq!(recorder.items(), vec![1]);
        assert!(!recorder.is_terminated());
    }

    #[test]
    fn then_fail_terminates_with_error_after_items() {
        let recorder = Recorder::new(UNBOUNDED);
        from_iter(vec![1, 2])
            .then_fail(Error::transport("reset"))
            .subscribe(recorder.subscriber());

        assert_eq!(recorder.items(), vec![1, 2]);
        assert_eq!(recorder.error().map(|e| e.kind()), Some(ErrorKind::Transport));
    }

    #[test]
    fn failed_and_empty_subscribe_before_terminating() {
        let failing = Recorder::<u8>::new(0);
        failed(Error::internal("nope")).subscribe(failing.subscriber());
        assert_eq!(failing.subscribe_count(), 1);
        assert!(failing.error().is_some());

        let completing = Recorder::<u8>::new(0);
        empty().subscribe(completing.subscriber());
        assert_eq!(completing.subscribe_count(), 1);
        assert!(completing.is_completed());
    }
}
