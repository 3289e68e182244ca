//! Execution and offloading subsystem.
//!
//! # Data Flow
//! ```text
//! service.required_offloads() ∪ filter.required_offloads() ∪ ...
//!     → strategy.rs (HttpExecutionStrategy merge)
//!     → context.rs (ExecutionContext: executor + io executor + strategy)
//!     → http::offload boundary asks IoExecutor::should_offload per request
//!     → executor.rs (WorkerExecutor runs the offloaded stages)
//! ```
//!
//! # Design Decisions
//! - Strategies are plain bitsets, merged by union
//! - The offload decision is a runtime predicate, the strategy only says where a
//!   boundary is needed

pub mod context;
pub mod executor;
pub mod strategy;

pub use context::ExecutionContext;
pub use executor::{
    io_executor_fn, is_worker_thread, Executor, FnIoExecutor, IoExecutor, RejectingExecutor,
    ThreadAwareIoExecutor, WorkerExecutor,
};
pub use strategy::{HttpExecutionStrategy, Offload};
