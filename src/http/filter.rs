//! Filter factories: functions from "next stage" to "this stage".
//!
//! A filter is a service holding the stage after it. Factories also report the
//! offloads the filters they create need, which feeds the strategy merge in the
//! server and client builders.

use std::sync::Arc;

use crate::concurrent::Single;
use crate::execution::HttpExecutionStrategy;
use crate::http::context::HttpServiceContext;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseFactory};
use crate::http::service::HttpService;

/// Wraps a `next` stage of type `S` into a new stage of the same type.
pub trait FilterFactory<S: ?Sized>: Send + Sync {
    fn create(&self, next: Arc<S>) -> Arc<S>;

    /// Stages the created filters need offloaded. Factories that say nothing are
    /// assumed to block and require every stage offloaded.
    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_all()
    }
}

impl<S: ?Sized, F: FilterFactory<S> + ?Sized> FilterFactory<S> for Arc<F> {
    fn create(&self, next: Arc<S>) -> Arc<S> {
        (**self).create(next)
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        (**self).required_offloads()
    }
}

/// Filter factory for server-side services.
pub type HttpServiceFilterFactory = dyn FilterFactory<dyn HttpService>;

/// Factory whose filters run a closure around the next stage. See [`filter_fn`].
pub struct FnFilterFactory<F> {
    f: Arc<F>,
    required_offloads: HttpExecutionStrategy,
}

/// Build a service filter factory from a closure receiving the next stage.
pub fn filter_fn<F>(f: F) -> FnFilterFactory<F>
where
    F: Fn(&HttpServiceContext, Request, &ResponseFactory, &Arc<dyn HttpService>) -> Single<Response>
        + Send
        + Sync
        + 'static,
{
    FnFilterFactory {
        f: Arc::new(f),
        required_offloads: HttpExecutionStrategy::offload_all(),
    }
}

impl<F> FnFilterFactory<F> {
    pub fn with_required_offloads(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.required_offloads = strategy;
        self
    }
}

impl<F> FilterFactory<dyn HttpService> for FnFilterFactory<F>
where
    F: Fn(&HttpServiceContext, Request, &ResponseFactory, &Arc<dyn HttpService>) -> Single<Response>
        + Send
        + Sync
        + 'static,
{
    fn create(&self, next: Arc<dyn HttpService>) -> Arc<dyn HttpService> {
        Arc::new(FnFilter {
            f: self.f.clone(),
            next,
        })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        self.required_offloads
    }
}

struct FnFilter<F> {
    f: Arc<F>,
    next: Arc<dyn HttpService>,
}

impl<F> HttpService for FnFilter<F>
where
    F: Fn(&HttpServiceContext, Request, &ResponseFactory, &Arc<dyn HttpService>) -> Single<Response>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        (self.f)(ctx, request, responses, &self.next)
    }
}

/// Applies the wrapped factory's filter only to requests matching a predicate.
///
/// The predicate runs on whatever thread the filter runs on; for a non-offloading
/// registration that is the I/O thread, so it must not block.
pub struct ConditionalFilterFactory<P, F> {
    predicate: Arc<P>,
    factory: F,
}

impl<P, F> ConditionalFilterFactory<P, F>
where
    P: Fn(&Request) -> bool + Send + Sync + 'static,
    F: FilterFactory<dyn HttpService>,
{
    pub fn new(predicate: P, factory: F) -> Self {
        Self {
            predicate: Arc::new(predicate),
            factory,
        }
    }
}

impl<P, F> FilterFactory<dyn HttpService> for ConditionalFilterFactory<P, F>
where
    P: Fn(&Request) -> bool + Send + Sync + 'static,
    F: FilterFactory<dyn HttpService>,
{
    fn create(&self, next: Arc<dyn HttpService>) -> Arc<dyn HttpService> {
        Arc::new(ConditionalFilter {
            predicate: self.predicate.clone(),
            filtered: self.factory.create(next.clone()),
            next,
        })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        self.factory.required_offloads()
    }
}

struct ConditionalFilter<P> {
    predicate: Arc<P>,
    filtered: Arc<dyn HttpService>,
    next: Arc<dyn HttpService>,
}

impl<P> HttpService for ConditionalFilter<P>
where
    P: Fn(&Request) -> bool + Send + Sync + 'static,
{
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        if (self.predicate)(&request) {
            self.filtered.handle(ctx, request, responses)
        } else {
            self.next.handle(ctx, request, responses)
        }
    }
}
