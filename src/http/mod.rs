//! HTTP services, filters and the pipeline that connects them.
//!
//! # Data Flow
//! ```text
//! transport (hyper, I/O thread)
//!     → internal.rs (keep-alive, exception mapper)
//!     → non-offloading filters (I/O thread)
//!     → offload.rs (boundary: hop to a worker if the strategy and predicate say so)
//!     → offloading filters
//!     → HttpService
//! ```
//!
//! # Design Decisions
//! - Filters are services wrapping the next service; factories build them once,
//!   when the server is bound
//! - Every stage reports the offloads it needs; server.rs merges them into the
//!   final strategy and places the boundary
//! - Synchronous failures are panics, caught and mapped at the boundary filters

pub mod chain;
pub mod client;
pub mod context;
pub mod filter;
pub mod internal;
pub mod keep_alive;
pub mod offload;
pub mod request;
pub mod response;
pub mod server;
pub mod service;

#[cfg(test)]
pub(crate) mod test_util;

pub use chain::build_chain;
pub use client::{requester_filter_fn, HttpClient, HttpClientBuilder, HttpRequester, HyperRequester};
pub use context::HttpServiceContext;
pub use filter::{filter_fn, ConditionalFilterFactory, FilterFactory, FnFilterFactory, HttpServiceFilterFactory};
pub use keep_alive::HttpKeepAlive;
pub use request::{Request, RequestExt, RequestId, X_REQUEST_ID};
pub use response::{Response, ResponseFactory};
pub use server::{HttpServerBuilder, ServicePipeline};
pub use service::{service_fn, HttpService, ServiceFn};
