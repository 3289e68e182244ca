//! The offload boundary between non-offloading and offloading filters.
//!
//! # Responsibilities
//! - Ask the I/O executor, per request, whether this request should hop now
//! - Run everything behind the boundary on the worker executor for the stages the
//!   strategy offloads
//!
//! # Design Decisions
//! - The boundary owns the offloading filters: it builds them onto the stage after
//!   it, so a request that does not hop runs the exact same chain inline
//! - Receive offloads move the whole `handle` call; a send-only offload calls
//!   `handle` inline and completes the response on a worker

use std::sync::Arc;

use crate::concurrent::Single;
use crate::execution::{Executor, HttpExecutionStrategy, IoExecutor};
use crate::http::chain::build_chain;
use crate::http::context::HttpServiceContext;
use crate::http::filter::FilterFactory;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseFactory};
use crate::http::service::HttpService;
use crate::observability::metrics;

/// Factory for the boundary filter.
pub struct OffloadingFilterFactory {
    strategy: HttpExecutionStrategy,
    offloaded_filters: Vec<Arc<dyn FilterFactory<dyn HttpService>>>,
    executor: Arc<dyn Executor>,
    io_executor: Arc<dyn IoExecutor>,
}

impl OffloadingFilterFactory {
    pub fn new(
        strategy: HttpExecutionStrategy,
        offloaded_filters: Vec<Arc<dyn FilterFactory<dyn HttpService>>>,
        executor: Arc<dyn Executor>,
        io_executor: Arc<dyn IoExecutor>,
    ) -> Self {
        Self {
            strategy,
            offloaded_filters,
            executor,
            io_executor,
        }
    }
}

impl FilterFactory<dyn HttpService> for OffloadingFilterFactory {
    fn create(&self, next: Arc<dyn HttpService>) -> Arc<dyn HttpService> {
        Arc::new(OffloadingFilter {
            strategy: self.strategy,
            offloaded: build_chain(&self.offloaded_filters, next),
            executor: self.executor.clone(),
            io_executor: self.io_executor.clone(),
        })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

struct OffloadingFilter {
    strategy: HttpExecutionStrategy,
    offloaded: Arc<dyn HttpService>,
    executor: Arc<dyn Executor>,
    io_executor: Arc<dyn IoExecutor>,
}

impl HttpService for OffloadingFilter {
    fn handle(
        &self,
        ctx: &HttpServiceContext,
        request: Request,
        responses: &ResponseFactory,
    ) -> Single<Response> {
        if !self.io_executor.should_offload() {
            return self.offloaded.handle(ctx, request, responses);
        }

        if self.strategy.is_request_offloaded() {
            metrics::record_offload();
            tracing::trace!(connection = %ctx, "Offloading request handling");
            let offloaded = self.offloaded.clone();
            let ctx = ctx.clone();
            let responses = *responses;
            Single::defer(move || offloaded.handle(&ctx, request, &responses)).submit_on(self.executor.as_ref())
        } else if self.strategy.is_send_offloaded() {
            metrics::record_offload();
            tracing::trace!(connection = %ctx, "Offloading response production");
            self.offloaded
                .handle(ctx, request, responses)
                .submit_on(self.executor.as_ref())
        } else {
            self.offloaded.handle(ctx, request, responses)
        }
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        HttpExecutionStrategy::offload_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::error::{Error, ErrorKind};
    use crate::execution::{io_executor_fn, is_worker_thread, ThreadAwareIoExecutor, WorkerExecutor};
    use crate::http::service::service_fn;
    use crate::http::test_util::{get, test_context};
    use axum::http::HeaderValue;

    fn reports_thread() -> Arc<dyn HttpService> {
        Arc::new(service_fn(|_: &HttpServiceContext, _: Request, responses: &ResponseFactory| {
            let mut response = responses.ok();
            let worker = if is_worker_thread() { "worker" } else { "io" };
            response.headers_mut().insert("x-thread", HeaderValue::from_static(worker));
            Single::succeeded(response)
        }))
    }

    fn executor(max_pending_tasks: usize) -> Arc<dyn Executor> {
        Arc::new(
            WorkerExecutor::new(&ExecutionConfig {
                worker_threads: 1,
                max_pending_tasks,
                ..ExecutionConfig::default()
            })
            .unwrap(),
        )
    }

    fn boundary(
        strategy: HttpExecutionStrategy,
        executor: Arc<dyn Executor>,
        io_executor: Arc<dyn IoExecutor>,
    ) -> Arc<dyn HttpService> {
        OffloadingFilterFactory::new(strategy, Vec::new(), executor, io_executor).create(reports_thread())
    }

    #[tokio::test]
    async fn receive_offload_runs_handle_on_a_worker() {
        let service = boundary(
            HttpExecutionStrategy::offload_all(),
            executor(8),
            Arc::new(ThreadAwareIoExecutor),
        );
        let response = service.handle(&test_context(), get("/"), &ResponseFactory).await.unwrap();
        assert_eq!(response.headers()["x-thread"], "worker");
    }

    #[tokio::test]
    async fn send_only_offload_calls_handle_inline() {
        let service = boundary(
            HttpExecutionStrategy::offload_none().with_send(),
            executor(8),
            Arc::new(ThreadAwareIoExecutor),
        );
        let response = service.handle(&test_context(), get("/"), &ResponseFactory).await.unwrap();
        assert_eq!(response.headers()["x-thread"], "io");
    }

    #[tokio::test]
    async fn predicate_can_veto_the_hop() {
        let service = boundary(
            HttpExecutionStrategy::offload_all(),
            executor(8),
            Arc::new(io_executor_fn(|| false)),
        );
        let response = service.handle(&test_context(), get("/"), &ResponseFactory).await.unwrap();
        assert_eq!(response.headers()["x-thread"], "io");
    }

    #[tokio::test]
    async fn saturated_executor_fails_with_rejected() {
        struct Refusing;
        impl Executor for Refusing {
            fn execute(&self, _task: futures_util::future::BoxFuture<'static, ()>) -> Result<(), Error> {
                Err(Error::rejected("full"))
            }
        }
        let service = boundary(
            HttpExecutionStrategy::offload_all(),
            Arc::new(Refusing),
            Arc::new(ThreadAwareIoExecutor),
        );
        let error = service
            .handle(&test_context(), get("/"), &ResponseFactory)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Rejected);
    }
}
