//! The service interface every request ends up at.

use std::sync::Arc;

use crate::concurrent::Single;
use crate::execution::HttpExecutionStrategy;
use crate::http::context::HttpServiceContext;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseFactory};

/// Asynchronous request handler.
///
/// Filters implement this trait too: a filter is a service that holds the next stage
/// and delegates to it.
pub trait HttpService: Send + Sync + 'static {
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response>;

    /// Stages this service needs offloaded. Services that say nothing are assumed to
    /// block and get every stage offloaded.
    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_all()
    }
}

impl<S: HttpService + ?Sized> HttpService for Arc<S> {
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        (**self).handle(ctx, request, responses)
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        (**self).required_offloads()
    }
}

/// Service backed by a closure. See [`service_fn`].
pub struct ServiceFn<F> {
    f: F,
    required_offloads: HttpExecutionStrategy,
}

/// Build an [`HttpService`] from a closure.
pub fn service_fn<F>(f: F) -> ServiceFn<F>
where
    F: Fn(&HttpServiceContext, Request, &ResponseFactory) -> Single<Response> + Send + Sync + 'static,
{
    ServiceFn {
        f,
        required_offloads: HttpExecutionStrategy::offload_all(),
    }
}

impl<F> ServiceFn<F> {
    /// Declare what the closure actually needs offloaded.
    pub fn with_required_offloads(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.required_offloads = strategy;
        self
    }
}

impl<F> HttpService for ServiceFn<F>
where
    F: Fn(&HttpServiceContext, Request, &ResponseFactory) -> Single<Response> + Send + Sync + 'static,
{
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        (self.f)(ctx, request, responses)
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        self.required_offloads
    }
}
