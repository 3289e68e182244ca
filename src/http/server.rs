//! HTTP server builder.
//!
//! # Responsibilities
//! - Collect filters: non-offloading (validated at registration) and offloading
//! - Compute the final execution strategy from service, filters and configuration
//! - Build the ordered chain, inserting one offload boundary when needed
//! - Wrap the result in the fixed keep-alive and exception-mapping filters
//! - Hand the pipeline to a [`ServerBinder`]
//!
//! Chain, outermost first:
//! ```text
//! keep-alive → exception mapper → non-offloading filters
//!     → [offload boundary → offloading filters]   (strategy has offloads)
//!     → service
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use crate::concurrent::Single;
use crate::config::{ExecutionConfig, ListenerConfig, ServerConfig};
use crate::error::Error;
use crate::execution::{
    ExecutionContext, Executor, HttpExecutionStrategy, IoExecutor, RejectingExecutor, ThreadAwareIoExecutor,
    WorkerExecutor,
};
use crate::http::chain::{build_chain, required_offloads};
use crate::http::filter::{ConditionalFilterFactory, FilterFactory};
use crate::http::internal::internal_filters;
use crate::http::offload::OffloadingFilterFactory;
use crate::http::request::Request;
use crate::http::service::HttpService;
use crate::transport::acceptor::AppendedAcceptor;
use crate::transport::{ConnectionAcceptor, HyperServerBinder, ServerBinder, ServerContext};

type ServiceFilter = Arc<dyn FilterFactory<dyn HttpService>>;

/// Builder for an HTTP server. Configuration only; nothing binds until
/// [`listen`](Self::listen) is awaited.
pub struct HttpServerBuilder {
    address: SocketAddr,
    listener: ListenerConfig,
    non_offloading_filters: Vec<ServiceFilter>,
    service_filters: Vec<ServiceFilter>,
    acceptor: Option<Arc<dyn ConnectionAcceptor>>,
    strategy: Option<HttpExecutionStrategy>,
    executor: Option<Arc<dyn Executor>>,
    execution: ExecutionConfig,
    io_executor: Arc<dyn IoExecutor>,
    drain_request_payload_body: bool,
    binder: Arc<dyn ServerBinder>,
}

/// The filtered service and the context it is bound with.
pub struct ServicePipeline {
    pub service: Arc<dyn HttpService>,
    pub execution_context: ExecutionContext,
    /// Final merged strategy.
    pub strategy: HttpExecutionStrategy,
    /// Whether an offload boundary was placed in the chain.
    pub offload_boundary: bool,
}

impl std::fmt::Debug for ServicePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePipeline")
            .field("strategy", &self.strategy)
            .field("offload_boundary", &self.offload_boundary)
            .finish_non_exhaustive()
    }
}

impl HttpServerBuilder {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            listener: ListenerConfig {
                bind_address: address.to_string(),
                ..ListenerConfig::default()
            },
            non_offloading_filters: Vec::new(),
            service_filters: Vec::new(),
            acceptor: None,
            strategy: None,
            executor: None,
            execution: ExecutionConfig::default(),
            io_executor: Arc::new(ThreadAwareIoExecutor),
            drain_request_payload_body: true,
            binder: Arc::new(HyperServerBinder),
        }
    }

    /// Builder preconfigured from a validated [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Result<Self, Error> {
        let address: SocketAddr = config.listener.bind_address.parse().map_err(|e| {
            Error::illegal_configuration(format!(
                "invalid bind address '{}': {e}",
                config.listener.bind_address
            ))
        })?;

        let mut builder = Self::new(address)
            .max_connections(config.listener.max_connections)
            .drain_request_payload_body(config.http.drain_request_payload_body);
        builder.execution = config.execution.clone();
        if let Some(offloads) = &config.execution.offloads {
            builder = builder.execution_strategy(HttpExecutionStrategy::from_offloads(offloads.iter().copied()));
        }
        Ok(builder)
    }

    /// Append a filter that must run on the I/O thread, before any offload.
    ///
    /// Fails with `ErrorKind::IllegalConfiguration` if the factory requires offloading.
    pub fn append_non_offloading_service_filter<F>(mut self, factory: F) -> Result<Self, Error>
    where
        F: FilterFactory<dyn HttpService> + 'static,
    {
        check_non_offloading(&factory)?;
        self.non_offloading_filters.push(Arc::new(factory));
        Ok(self)
    }

    /// [`append_non_offloading_service_filter`](Self::append_non_offloading_service_filter)
    /// applied only to requests matching `predicate`. The predicate must not block.
    pub fn append_non_offloading_service_filter_if<P, F>(self, predicate: P, factory: F) -> Result<Self, Error>
    where
        P: Fn(&Request) -> bool + Send + Sync + 'static,
        F: FilterFactory<dyn HttpService> + 'static,
    {
        self.append_non_offloading_service_filter(ConditionalFilterFactory::new(predicate, factory))
    }

    /// Append a filter; its offload requirement is merged into the strategy.
    pub fn append_service_filter<F>(mut self, factory: F) -> Self
    where
        F: FilterFactory<dyn HttpService> + 'static,
    {
        self.service_filters.push(Arc::new(factory));
        self
    }

    pub fn append_service_filter_if<P, F>(self, predicate: P, factory: F) -> Self
    where
        P: Fn(&Request) -> bool + Send + Sync + 'static,
        F: FilterFactory<dyn HttpService> + 'static,
    {
        self.append_service_filter(ConditionalFilterFactory::new(predicate, factory))
    }

    /// Append a connection acceptor; acceptors run in append order.
    pub fn append_connection_acceptor<A>(mut self, acceptor: A) -> Self
    where
        A: ConnectionAcceptor,
    {
        let appended: Arc<dyn ConnectionAcceptor> = Arc::new(acceptor);
        self.acceptor = Some(match self.acceptor.take() {
            Some(existing) => Arc::new(AppendedAcceptor::new(existing, appended)),
            None => appended,
        });
        self
    }

    /// Explicit strategy, merged with what the service and filters require.
    pub fn execution_strategy(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Worker executor for offloaded stages. Defaults to a [`WorkerExecutor`] built
    /// from the execution configuration, created only if the pipeline offloads.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Predicate consulted at the offload boundary for every request.
    pub fn io_executor(mut self, io_executor: Arc<dyn IoExecutor>) -> Self {
        self.io_executor = io_executor;
        self
    }

    pub fn drain_request_payload_body(mut self, enable: bool) -> Self {
        self.drain_request_payload_body = enable;
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.listener.max_connections = max_connections;
        self
    }

    /// Replace the transport.
    pub fn binder(mut self, binder: Arc<dyn ServerBinder>) -> Self {
        self.binder = binder;
        self
    }

    /// Final strategy for `service`: the merged requirements of the service and the
    /// offloading filters, plus the explicit strategy if one was set.
    pub fn compute_strategy(&self, service: &dyn HttpService) -> HttpExecutionStrategy {
        let filter_strategy = required_offloads(&self.service_filters, service.required_offloads());
        self.strategy
            .map_or(filter_strategy, |explicit| explicit.merge(filter_strategy))
    }

    /// Build the complete, immutable request pipeline for `service`.
    pub fn build_pipeline<S: HttpService>(&self, service: S) -> Result<ServicePipeline, Error> {
        let strategy = self.compute_strategy(&service);
        let offload_boundary = strategy.has_offloads();
        // Worker threads are only started for pipelines with an offload boundary.
        let executor: Arc<dyn Executor> = match &self.executor {
            Some(executor) => executor.clone(),
            None if offload_boundary => Arc::new(WorkerExecutor::new(&self.execution)?),
            None => Arc::new(RejectingExecutor),
        };
        let raw: Arc<dyn HttpService> = Arc::new(service);

        let mut chain = self.non_offloading_filters.clone();
        if offload_boundary {
            chain.push(Arc::new(OffloadingFilterFactory::new(
                strategy,
                self.service_filters.clone(),
                executor.clone(),
                self.io_executor.clone(),
            )));
        } else {
            chain.extend(self.service_filters.iter().cloned());
        }
        let filtered = build_chain(&chain, raw);
        let service = build_chain(&internal_filters(), filtered);

        tracing::debug!(
            strategy = %strategy,
            offload_boundary,
            non_offloading_filters = self.non_offloading_filters.len(),
            service_filters = self.service_filters.len(),
            "Service pipeline built"
        );

        // The boundary takes care of every offload, the transport none.
        let transport_strategy = if offload_boundary {
            HttpExecutionStrategy::offload_none()
        } else {
            strategy
        };
        Ok(ServicePipeline {
            service,
            execution_context: ExecutionContext::new(executor, self.io_executor.clone(), transport_strategy),
            strategy,
            offload_boundary,
        })
    }

    /// Build the pipeline and bind it. The returned `Single` completes once the server
    /// accepts connections.
    pub fn listen<S: HttpService>(self, service: S) -> Single<ServerContext> {
        let pipeline = match self.build_pipeline(service) {
            Ok(pipeline) => pipeline,
            Err(error) => return Single::failed(error),
        };
        let strategy = pipeline.strategy;
        self.binder
            .bind(
                pipeline.execution_context,
                self.listener,
                self.address,
                self.acceptor,
                pipeline.service,
                self.drain_request_payload_body,
            )
            .map(move |server| {
                tracing::debug!(
                    address = %server.listen_address(),
                    strategy = %strategy,
                    "Server listening"
                );
                server
            })
    }
}

fn check_non_offloading<F>(factory: &F) -> Result<(), Error>
where
    F: FilterFactory<dyn HttpService>,
{
    let required = factory.required_offloads();
    if required.has_offloads() {
        return Err(Error::illegal_configuration(format!(
            "non-offloading filter requires offloads: {required}"
        )));
    }
    Ok(())
}
