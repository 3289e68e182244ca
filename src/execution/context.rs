//! Executors and strategy a server or client runs with.

use std::sync::Arc;

use crate::execution::executor::{Executor, IoExecutor};
use crate::execution::strategy::HttpExecutionStrategy;

/// Immutable bundle handed to the transport and to every request context.
#[derive(Clone)]
pub struct ExecutionContext {
    executor: Arc<dyn Executor>,
    io_executor: Arc<dyn IoExecutor>,
    strategy: HttpExecutionStrategy,
}

impl ExecutionContext {
    pub fn new(
        executor: Arc<dyn Executor>,
        io_executor: Arc<dyn IoExecutor>,
        strategy: HttpExecutionStrategy,
    ) -> Self {
        Self {
            executor,
            io_executor,
            strategy,
        }
    }

    /// Worker executor offloaded stages are submitted to.
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn io_executor(&self) -> &Arc<dyn IoExecutor> {
        &self.io_executor
    }

    pub fn execution_strategy(&self) -> HttpExecutionStrategy {
        self.strategy
    }

    #[must_use]
    pub fn with_execution_strategy(mut self, strategy: HttpExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
