//! Asynchronous HTTP toolkit built around explicit execution offloading.
//!
//! Services and filters declare which request-processing stages may block; the
//! server builder merges those declarations into one execution strategy and places a
//! single offload boundary in the filter chain, so non-blocking work stays on the
//! I/O threads and everything else runs on a worker pool.

pub mod concurrent;
pub mod config;
pub mod error;
pub mod execution;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod transport;

pub use config::ServerConfig;
pub use error::{Error, ErrorKind};
pub use execution::{HttpExecutionStrategy, Offload};
pub use http::{HttpClient, HttpClientBuilder, HttpServerBuilder, HttpService};
pub use lifecycle::Shutdown;
pub use transport::ServerContext;
