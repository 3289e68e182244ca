//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! ServerContext::close() / Ctrl+C in the binary
//!     → Shutdown::trigger()
//!     → accept loop stops accepting
//!     → every connection gets a graceful shutdown
//!     → ServerContext::closed() resolves once the last connection is gone
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - One signal per server, shared by clones

pub mod shutdown;

pub use shutdown::Shutdown;
