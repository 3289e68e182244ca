//! Manually driven sources and recording subscribers for unit tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::concurrent::publisher::Publisher;
use crate::concurrent::subscriber::{add_demand, Subscriber, Subscription};
use crate::error::Error;

/// Subscription that only records what it was asked to do.
#[derive(Debug, Default)]
pub(crate) struct TestSubscription {
    requested: AtomicU64,
    request_calls: AtomicU64,
    cancel_calls: AtomicU64,
}

impl TestSubscription {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn request_calls(&self) -> u64 {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_calls(&self) -> u64 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_calls() > 0
    }
}

impl Subscription for TestSubscription {
    fn request(&self, n: u64) {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .requested
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| Some(add_demand(d, n)));
    }

    fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Publisher whose signals are issued by the test itself.
pub(crate) struct TestPublisher<T> {
    subscriber: Mutex<Option<Box<dyn Subscriber<T>>>>,
    subscribes: AtomicUsize,
}

impl<T> TestPublisher<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscriber: Mutex::new(None),
            subscribes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    fn with_subscriber(&self, f: impl FnOnce(&mut Box<dyn Subscriber<T>>)) {
        let mut guard = self.subscriber.lock().unwrap();
        f(guard.as_mut().expect("no subscriber attached"));
    }

    pub(crate) fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.with_subscriber(|s| s.on_subscribe(subscription));
    }

    pub(crate) fn on_next(&self, item: T) {
        self.with_subscriber(|s| s.on_next(item));
    }

    pub(crate) fn on_error(&self, error: Error) {
        self.with_subscriber(|s| s.on_error(error));
    }

    pub(crate) fn on_complete(&self) {
        self.with_subscriber(|s| s.on_complete());
    }
}

impl<T> Publisher<T> for TestPublisher<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        *self.subscriber.lock().unwrap() = Some(subscriber);
        self.subscribes.fetch_add(1, Ordering::SeqCst);
    }
}

struct RecorderState<T> {
    items: Vec<T>,
    error: Option<Error>,
    completed: bool,
    terminals: usize,
    subscribes: usize,
    subscription: Option<Arc<dyn Subscription>>,
}

/// Shared view of everything a recording subscriber observed.
pub(crate) struct Recorder<T> {
    state: Arc<Mutex<RecorderState<T>>>,
    initial_request: u64,
    request_per_item: u64,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            initial_request: self.initial_request,
            request_per_item: self.request_per_item,
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Records signals and requests `initial_request` items from `on_subscribe`.
    pub(crate) fn new(initial_request: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                items: Vec::new(),
                error: None,
                completed: false,
                terminals: 0,
                subscribes: 0,
                subscription: None,
            })),
            initial_request,
            request_per_item: 0,
        }
    }

    /// Also request `n` more items from inside every `on_next`.
    pub(crate) fn request_on_next(mut self, n: u64) -> Self {
        self.request_per_item = n;
        self
    }

    pub(crate) fn subscriber(&self) -> Box<dyn Subscriber<T>> {
        Box::new(RecordingSubscriber {
            recorder: self.clone(),
        })
    }

    fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.state.lock().unwrap().subscription.clone()
    }

    pub(crate) fn request(&self, n: u64) {
        if let Some(subscription) = self.subscription() {
            subscription.request(n);
        }
    }

    pub(crate) fn cancel(&self) {
        if let Some(subscription) = self.subscription() {
            subscription.cancel();
        }
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.state.lock().unwrap().items.clone()
    }

    pub(crate) fn error(&self) -> Option<Error> {
        self.state.lock().unwrap().error.clone()
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.lock().unwrap().completed
    }

    pub(crate) fn is_terminated(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.completed || state.error.is_some()
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.state.lock().unwrap().subscribes
    }

    /// Number of `on_error` plus `on_complete` calls seen.
    pub(crate) fn terminal_count(&self) -> usize {
        self.state.lock().unwrap().terminals
    }
}

struct RecordingSubscriber<T> {
    recorder: Recorder<T>,
}

impl<T: Clone + Send + 'static> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        {
            let mut state = self.recorder.state.lock().unwrap();
            state.subscribes += 1;
            state.subscription = Some(subscription.clone());
        }
        if self.recorder.initial_request > 0 {
            subscription.request(self.recorder.initial_request);
        }
    }

    fn on_next(&mut self, item: T) {
        self.recorder.state.lock().unwrap().items.push(item);
        if self.recorder.request_per_item > 0 {
            self.recorder.request(self.recorder.request_per_item);
        }
    }

    fn on_error(&mut self, error: Error) {
        let mut state = self.recorder.state.lock().unwrap();
        state.error = Some(error);
        state.terminals += 1;
    }

    fn on_complete(&mut self) {
        let mut state = self.recorder.state.lock().unwrap();
        state.completed = true;
        state.terminals += 1;
    }
}
