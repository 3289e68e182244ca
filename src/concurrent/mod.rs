//! Asynchronous primitives the HTTP layer is built on.
//!
//! # Data Flow
//! ```text
//! Publisher::subscribe(subscriber)
//!     → subscriber.on_subscribe(subscription)
//!     → subscription.request(n)            (demand)
//!     → on_next × ≤ n
//!     → on_error | on_complete             (terminal, at most one)
//!
//! on_error_resume:
//!     first source ──fails──▶ fallback source, same downstream subscription
//!     demand carried across by SequentialSubscription
//! ```
//!
//! # Design Decisions
//! - Streams are push-based with explicit demand; single results are futures
//! - Operators never deliver signals concurrently for one subscription

mod conforming;
mod publisher;
mod resume;
mod sequential;
mod single;
mod subscriber;

#[cfg(test)]
pub(crate) mod test_util;

pub use conforming::{Conforming, ConformingPublisher};
pub use publisher::{empty, failed, from_iter, Empty, Failed, FromIter, Publisher, PublisherExt};
pub use resume::ResumePublisher;
pub use sequential::SequentialSubscription;
pub use single::Single;
pub use subscriber::{add_demand, EmptySubscription, Subscriber, Subscription, UNBOUNDED};
