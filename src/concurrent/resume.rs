//! Resume-on-error: subscribe to a fallback source once when the first one fails.
//!
//! ```text
//! first ──on_subscribe──▶ SequentialSubscription ──on_subscribe──▶ downstream (once)
//! first ──on_error──▶ fallback(&error) ──▶ next.subscribe(same shared state)
//! next  ──on_subscribe──▶ switch_to(next)    (no second on_subscribe downstream)
//! next  ──on_error──▶ downstream             (fallback already consumed)
//! ```
//!
//! The fallback factory is taken out of the subscription state when it is invoked, so
//! every subscription attempts at most one fallback no matter how the fallback source
//! behaves.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::concurrent::publisher::Publisher;
use crate::concurrent::sequential::SequentialSubscription;
use crate::concurrent::subscriber::{Subscriber, Subscription};
use crate::error::Error;

/// Publisher returned by [`PublisherExt::on_error_resume`](crate::concurrent::PublisherExt::on_error_resume).
pub struct ResumePublisher<P, F> {
    first: P,
    fallback: Arc<F>,
}

impl<P, F> ResumePublisher<P, F> {
    pub(crate) fn new(first: P, fallback: F) -> Self {
        Self {
            first,
            fallback: Arc::new(fallback),
        }
    }
}

impl<T, P, F, N> Publisher<T> for ResumePublisher<P, F>
where
    T: Send + 'static,
    P: Publisher<T>,
    F: Fn(&Error) -> Result<N, Error> + Send + Sync + 'static,
    N: Publisher<T> + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let shared = Arc::new(ResumeShared {
            downstream: Mutex::new(subscriber),
            state: Mutex::new(ResumeState::Unsubscribed),
            fallback: Mutex::new(Some(self.fallback.clone())),
        });
        self.first.subscribe(Box::new(ResumeSubscriber {
            shared,
            source: Source::First,
            done: false,
        }));
    }
}

/// Which upstream a [`ResumeSubscriber`] handle is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    First,
    Fallback,
}

enum ResumeState {
    Unsubscribed,
    Subscribed(Arc<SequentialSubscription>),
    Switched(Arc<SequentialSubscription>),
}

struct ResumeShared<T, F> {
    downstream: Mutex<Box<dyn Subscriber<T>>>,
    state: Mutex<ResumeState>,
    fallback: Mutex<Option<Arc<F>>>,
}

impl<T, F> ResumeShared<T, F> {
    fn state(&self) -> MutexGuard<'_, ResumeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downstream(&self) -> MutexGuard<'_, Box<dyn Subscriber<T>>> {
        self.downstream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_fallback(&self) -> Option<Arc<F>> {
        self.fallback.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Signals from the first source are ignored once the fallback is in charge.
    fn is_abandoned(&self, source: Source) -> bool {
        source == Source::First && matches!(*self.state(), ResumeState::Switched(_))
    }
}

/// Per-source handle onto the shared resume state.
struct ResumeSubscriber<T, F> {
    shared: Arc<ResumeShared<T, F>>,
    source: Source,
    done: bool,
}

enum SubscribeAction {
    Deliver(Arc<SequentialSubscription>),
    Switch(Arc<SequentialSubscription>),
    Reject,
}

impl<T, F, N> Subscriber<T> for ResumeSubscriber<T, F>
where
    T: Send + 'static,
    F: Fn(&Error) -> Result<N, Error> + Send + Sync + 'static,
    N: Publisher<T> + 'static,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        let action = {
            let mut state = self.shared.state();
            match (&*state, self.source) {
                (ResumeState::Unsubscribed, Source::First) => {
                    let sequential = Arc::new(SequentialSubscription::new(subscription.clone()));
                    *state = ResumeState::Subscribed(sequential.clone());
                    SubscribeAction::Deliver(sequential)
                }
                (ResumeState::Subscribed(sequential), Source::Fallback) => {
                    let sequential = sequential.clone();
                    *state = ResumeState::Switched(sequential.clone());
                    SubscribeAction::Switch(sequential)
                }
                _ => SubscribeAction::Reject,
            }
        };

        match action {
            SubscribeAction::Deliver(sequential) => {
                self.shared.downstream().on_subscribe(sequential);
            }
            SubscribeAction::Switch(sequential) => {
                tracing::debug!("Resuming from fallback source");
                sequential.switch_to(subscription);
            }
            SubscribeAction::Reject => {
                tracing::warn!(source = ?self.source, "Unexpected on_subscribe, cancelling");
                subscription.cancel();
            }
        }
    }

    fn on_next(&mut self, item: T) {
        if self.done {
            return;
        }
        // Each source may only emit through a sequential subscription it subscribed to
        // itself: the first source while `Subscribed`, the fallback once `Switched`.
        let sequential = match (&*self.shared.state(), self.source) {
            (ResumeState::Subscribed(sequential), Source::First) => Some(sequential.clone()),
            (ResumeState::Switched(_), Source::First) => return,
            (ResumeState::Switched(sequential), Source::Fallback) => Some(sequential.clone()),
            (ResumeState::Unsubscribed, _) | (ResumeState::Subscribed(_), Source::Fallback) => None,
        };
        let Some(sequential) = sequential else {
            panic!("on_next delivered before on_subscribe completed; upstream source is not conformant");
        };
        sequential.item_received();
        self.shared.downstream().on_next(item);
    }

    fn on_error(&mut self, error: Error) {
        if std::mem::replace(&mut self.done, true) || self.shared.is_abandoned(self.source) {
            return;
        }
        let Some(fallback) = self.shared.take_fallback() else {
            self.shared.downstream().on_error(error);
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| (*fallback)(&error))) {
            Ok(Ok(next)) => {
                next.subscribe(Box::new(ResumeSubscriber {
                    shared: self.shared.clone(),
                    source: Source::Fallback,
                    done: false,
                }));
            }
            Ok(Err(factory_error)) => {
                self.shared.downstream().on_error(factory_error.with_suppressed(error));
            }
            Err(panic) => {
                self.shared
                    .downstream()
                    .on_error(Error::from_panic(panic).with_suppressed(error));
            }
        }
    }

    fn on_complete(&mut self) {
        if std::mem::replace(&mut self.done, true) || self.shared.is_abandoned(self.source) {
            return;
        }
        self.shared.downstream().on_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent::publisher::{failed, from_iter};
    use crate::concurrent::subscriber::UNBOUNDED;
    use crate::concurrent::test_util::{Recorder, TestPublisher, TestSubscription};
    use crate::concurrent::PublisherExt;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting<N: Clone>(
        calls: &Arc<AtomicUsize>,
        next: N,
    ) -> impl Fn(&Error) -> Result<N, Error> + Send + Sync + 'static
    where
        N: Send + Sync + 'static,
    {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(next.clone())
        }
    }

    #[test]
    fn resumes_once_and_delivers_second_failure_directly() {
        let first = Arc::new(TestPublisher::new());
        let fallback = Arc::new(TestPublisher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(0);

        first
            .clone()
            .on_error_resume(counting(&calls, fallback.clone()))
            .subscribe(recorder.subscriber());

        let first_upstream = Arc::new(TestSubscription::new());
        first.on_subscribe(first_upstream.clone());
        recorder.request(5);
        first.on_next(1);
        first.on_next(2);
        first.on_error(Error::transport("connection reset"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.subscribe_count(), 1);

        let fallback_upstream = Arc::new(TestSubscription::new());
        fallback.on_subscribe(fallback_upstream.clone());
        assert_eq!(fallback_upstream.requested(), 3);

        fallback.on_next(3);
        fallback.on_error(Error::transport("reset again"));

        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.items(), vec![1, 2, 3]);
        let error = recorder.error().expect("second failure is delivered");
        assert_eq!(error.message(), "reset again");
        assert!(error.suppressed().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resumes_into_a_synchronous_fallback() {
        let recorder = Recorder::new(UNBOUNDED);
        from_iter(vec![1, 2])
            .then_fail(Error::internal("boom"))
            .on_error_resume(|_| Ok(from_iter(vec![3, 4])))
            .subscribe(recorder.subscriber());

        assert_eq!(recorder.items(), vec![1, 2, 3, 4]);
        assert!(recorder.is_completed());
        assert_eq!(recorder.subscribe_count(), 1);
    }

    #[test]
    fn fallback_factory_failure_carries_original_as_suppressed() {
        let recorder = Recorder::<i32>::new(1);
        failed(Error::transport("original"))
            .on_error_resume(|_| Err::<crate::concurrent::Empty<i32>, _>(Error::illegal_configuration("no fallback")))
            .subscribe(recorder.subscriber());

        let error = recorder.error().expect("error expected");
        assert_eq!(error.kind(), ErrorKind::IllegalConfiguration);
        assert_eq!(error.suppressed().len(), 1);
        assert_eq!(error.suppressed()[0].message(), "original");
    }

    #[test]
    fn panicking_fallback_factory_is_reported_with_suppressed_cause() {
        let recorder = Recorder::<i32>::new(1);
        failed(Error::transport("original"))
            .on_error_resume(|_| -> Result<crate::concurrent::Empty<i32>, Error> { panic!("factory exploded") })
            .subscribe(recorder.subscriber());

        let error = recorder.error().expect("error expected");
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(error.message().contains("factory exploded"));
        assert_eq!(error.suppressed()[0].message(), "original");
    }

    #[test]
    fn fallback_failing_before_on_subscribe_does_not_resume_again() {
        let first = Arc::new(TestPublisher::<i32>::new());
        let fallback = Arc::new(TestPublisher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(1);

        first
            .clone()
            .on_error_resume(counting(&calls, fallback.clone()))
            .subscribe(recorder.subscriber());
        first.on_subscribe(Arc::new(TestSubscription::new()));
        first.on_error(Error::transport("first"));

        fallback.on_error(Error::transport("fallback never subscribed"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.error().map(|e| e.message().to_string()),
            Some("fallback never subscribed".to_string())
        );
    }

    #[test]
    fn abandoned_source_is_ignored_after_switch() {
        let first = Arc::new(TestPublisher::new());
        let fallback = Arc::new(TestPublisher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(UNBOUNDED);

        first
            .clone()
            .on_error_resume(counting(&calls, fallback.clone()))
            .subscribe(recorder.subscriber());
        first.on_subscribe(Arc::new(TestSubscription::new()));
        first.on_error(Error::transport("first"));
        fallback.on_subscribe(Arc::new(TestSubscription::new()));

        first.on_next(99);
        first.on_complete();
        fallback.on_next(1);

        assert_eq!(recorder.items(), vec![1]);
        assert!(!recorder.is_terminated());
    }

    #[test]
    fn cancel_reaches_the_fallback_upstream() {
        let first = Arc::new(TestPublisher::<i32>::new());
        let fallback = Arc::new(TestPublisher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(2);

        first
            .clone()
            .on_error_resume(counting(&calls, fallback.clone()))
            .subscribe(recorder.subscriber());
        let first_upstream = Arc::new(TestSubscription::new());
        first.on_subscribe(first_upstream.clone());
        first.on_error(Error::transport("first"));

        let fallback_upstream = Arc::new(TestSubscription::new());
        fallback.on_subscribe(fallback_upstream.clone());
        recorder.cancel();

        assert!(fallback_upstream.is_cancelled());
        assert!(!first_upstream.is_cancelled());
    }

    #[test]
    fn first_terminal_racing_fallback_subscribe_delivers_one_terminal() {
        for _ in 0..200 {
            let first = Arc::new(TestPublisher::new());
            let fallback = Arc::new(TestPublisher::new());
            let calls = Arc::new(AtomicUsize::new(0));
            let recorder = Recorder::new(UNBOUNDED);

            first
                .clone()
                .on_error_resume(counting(&calls, fallback.clone()))
                .subscribe(recorder.subscriber());
            first.on_subscribe(Arc::new(TestSubscription::new()));
            first.on_next(0);

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let failing = {
                let (first, barrier) = (first.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    first.on_error(Error::transport("first"));
                    // Late signals from the abandoned source.
                    first.on_next(99);
                    first.on_complete();
                })
            };
            let resuming = {
                let (fallback, barrier) = (fallback.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    while fallback.subscribe_count() == 0 {
                        std::thread::yield_now();
                    }
                    let upstream = Arc::new(TestSubscription::new());
                    fallback.on_subscribe(upstream.clone());
                    fallback.on_next(1);
                    fallback.on_next(2);
                    fallback.on_complete();
                    upstream
                })
            };
            failing.join().unwrap();
            let upstream = resuming.join().unwrap();

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(recorder.items(), vec![0, 1, 2]);
            assert_eq!(recorder.terminal_count(), 1);
            assert!(recorder.is_completed());
            assert!(recorder.error().is_none());
            assert_eq!(recorder.subscribe_count(), 1);
            assert_eq!(upstream.requested(), UNBOUNDED);
        }
    }

    #[test]
    #[should_panic(expected = "before on_subscribe")]
    fn fallback_on_next_before_its_on_subscribe_panics() {
        let first = Arc::new(TestPublisher::new());
        let fallback = Arc::new(TestPublisher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = Recorder::new(0);

        first
            .clone()
            .on_error_resume(counting(&calls, fallback.clone()))
            .subscribe(recorder.subscriber());
        first.on_subscribe(Arc::new(TestSubscription::new()));
        first.on_error(Error::transport("first"));
        assert_eq!(fallback.subscribe_count(), 1);

        fallback.on_next(42);
    }

    #[test]
    #[should_panic(expected = "before on_subscribe")]
    fn on_next_before_on_subscribe_panics() {
        let first = Arc::new(TestPublisher::new());
        let recorder = Recorder::new(1);
        first
            .clone()
            .on_error_resume(|_| Ok(from_iter(vec![0])))
            .subscribe(recorder.subscriber());

        first.on_next(1);
    }
}
