//! HTTP client with the same filter and offloading model as the server.
//!
//! # Data Flow
//! ```text
//! HttpClient::request
//!     → client filters (append order, outermost first)
//!     → HyperRequester (hyper-util legacy client, connection pooling)
//!     → response completed on a worker when the strategy offloads receive stages
//! ```

use std::sync::Arc;

use axum::body::Body;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::concurrent::Single;
use crate::config::ExecutionConfig;
use crate::error::Error;
use crate::execution::{Executor, HttpExecutionStrategy, RejectingExecutor, WorkerExecutor};
use crate::http::chain::{build_chain, required_offloads};
use crate::http::filter::FilterFactory;
use crate::http::request::Request;
use crate::http::response::Response;

/// Sends a request and produces its response. Client filters are requesters
/// holding the next requester.
pub trait HttpRequester: Send + Sync + 'static {
    fn request(&self, request: Request) -> Single<Response>;
}

impl<R: HttpRequester + ?Sized> HttpRequester for Arc<R> {
    fn request(&self, request: Request) -> Single<Response> {
        (**self).request(request)
    }
}

/// Filter factory for client requesters.
pub type HttpRequesterFilterFactory = dyn FilterFactory<dyn HttpRequester>;

/// Terminal requester over hyper-util's pooled client.
#[derive(Clone)]
pub struct HyperRequester {
    client: Client<HttpConnector, Body>,
}

impl HyperRequester {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperRequester {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequester for HyperRequester {
    fn request(&self, request: Request) -> Single<Response> {
        let client = self.client.clone();
        Single::new(async move {
            let target = request.uri().clone();
            let response = client
                .request(request)
                .await
                .map_err(|e| Error::transport(format!("request to {target} failed: {e}")))?;
            Ok(response.map(Body::new))
        })
    }
}

/// Requester filter factory backed by a closure. See [`requester_filter_fn`].
pub struct FnRequesterFilterFactory<F> {
    f: Arc<F>,
    required_offloads: HttpExecutionStrategy,
}

/// Build a client filter factory from a closure receiving the next requester.
pub fn requester_filter_fn<F>(f: F) -> FnRequesterFilterFactory<F>
where
    F: Fn(Request, &Arc<dyn HttpRequester>) -> Single<Response> + Send + Sync + 'static,
{
    FnRequesterFilterFactory {
        f: Arc::new(f),
        required_offloads: HttpExecutionStrategy::offload_all(),
    }
}

impl<F> FnRequesterFilterFactory<F> {
    pub fn with_required_offloads(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.required_offloads = strategy;
        self
    }
}

impl<F> FilterFactory<dyn HttpRequester> for FnRequesterFilterFactory<F>
where
    F: Fn(Request, &Arc<dyn HttpRequester>) -> Single<Response> + Send + Sync + 'static,
{
    fn create(&self, next: Arc<dyn HttpRequester>) -> Arc<dyn HttpRequester> {
        Arc::new(FnRequesterFilter { f: self.f.clone(), next })
    }

    fn required_offloads(&self) -> HttpExecutionStrategy {
        self.required_offloads
    }
}

struct FnRequesterFilter<F> {
    f: Arc<F>,
    next: Arc<dyn HttpRequester>,
}

impl<F> HttpRequester for FnRequesterFilter<F>
where
    F: Fn(Request, &Arc<dyn HttpRequester>) -> Single<Response> + Send + Sync + 'static,
{
    fn request(&self, request: Request) -> Single<Response> {
        (self.f)(request, &self.next)
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    filters: Vec<Arc<HttpRequesterFilterFactory>>,
    strategy: Option<HttpExecutionStrategy>,
    executor: Option<Arc<dyn Executor>>,
    execution: ExecutionConfig,
    requester: Option<Arc<dyn HttpRequester>>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            strategy: None,
            executor: None,
            execution: ExecutionConfig::default(),
            requester: None,
        }
    }

    /// Append a filter; the first appended filter sees the request first.
    pub fn append_client_filter<F>(mut self, factory: F) -> Self
    where
        F: FilterFactory<dyn HttpRequester> + 'static,
    {
        self.filters.push(Arc::new(factory));
        self
    }

    pub fn execution_strategy(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Worker pool settings used when no executor is supplied.
    pub fn execution_config(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    /// Replace the terminal requester (hyper by default).
    pub fn requester(mut self, requester: Arc<dyn HttpRequester>) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn build(self) -> Result<HttpClient, Error> {
        // The hyper requester itself never blocks.
        let filter_strategy = required_offloads(&self.filters, HttpExecutionStrategy::offload_none());
        let strategy = self
            .strategy
            .map_or(filter_strategy, |explicit| explicit.merge(filter_strategy));

        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None if strategy.is_request_offloaded() => Arc::new(WorkerExecutor::new(&self.execution)?),
            None => Arc::new(RejectingExecutor),
        };
        let terminal: Arc<dyn HttpRequester> = match self.requester {
            Some(requester) => requester,
            None => Arc::new(HyperRequester::new()),
        };
        let requester = build_chain(&self.filters, terminal);

        tracing::debug!(strategy = %strategy, filters = self.filters.len(), "HTTP client built");
        Ok(HttpClient {
            requester,
            strategy,
            executor,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Filtered HTTP client. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    requester: Arc<dyn HttpRequester>,
    strategy: HttpExecutionStrategy,
    executor: Arc<dyn Executor>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Send `request` through the filters.
    pub fn request(&self, request: Request) -> Single<Response> {
        let response = self.requester.request(request);
        if self.strategy.is_request_offloaded() {
            response.submit_on(self.executor.as_ref())
        } else {
            response
        }
    }

    pub fn strategy(&self) -> HttpExecutionStrategy {
        self.strategy
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
