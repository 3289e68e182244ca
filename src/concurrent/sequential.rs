//! A subscription whose backing upstream can be replaced mid-flight.
//!
//! # Responsibilities
//! - Forward demand to the current upstream and remember what is still outstanding
//! - On [`SequentialSubscription::switch_to`], hand exactly the outstanding demand to the
//!   new upstream
//! - Propagate cancellation to whichever upstream is current, now or later
//!
//! # Design Decisions
//! - Current handle, outstanding count and cancelled flag live behind one mutex so a
//!   switch is linearizable with concurrent `request` / `item_received` calls
//! - Upstream calls are made after the lock is released; an upstream may re-enter

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::concurrent::subscriber::{add_demand, Subscription, UNBOUNDED};

struct State {
    current: Arc<dyn Subscription>,
    outstanding: u64,
    cancelled: bool,
    switches: u32,
}

/// See the module documentation.
pub struct SequentialSubscription {
    state: Mutex<State>,
}

impl SequentialSubscription {
    pub fn new(initial: Arc<dyn Subscription>) -> Self {
        Self {
            state: Mutex::new(State {
                current: initial,
                outstanding: 0,
                cancelled: false,
                switches: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active upstream and re-request the outstanding demand from it.
    ///
    /// After [`cancel`](Subscription::cancel) the new upstream is cancelled instead.
    pub fn switch_to(&self, next: Arc<dyn Subscription>) {
        let mut state = self.lock();
        if state.cancelled {
            drop(state);
            next.cancel();
            return;
        }
        state.current = next.clone();
        state.switches += 1;
        let outstanding = state.outstanding;
        drop(state);

        tracing::trace!(outstanding, "Switched upstream subscription");
        if outstanding > 0 {
            next.request(outstanding);
        }
    }

    /// Account for an item about to be forwarded downstream.
    pub fn item_received(&self) {
        let mut state = self.lock();
        if state.outstanding != UNBOUNDED {
            state.outstanding = state.outstanding.saturating_sub(1);
        }
    }

    /// Demand requested but not yet satisfied.
    pub fn outstanding(&self) -> u64 {
        self.lock().outstanding
    }

    /// Number of completed switches.
    pub fn switches(&self) -> u32 {
        self.lock().switches
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }
}

impl Subscription for SequentialSubscription {
    fn request(&self, n: u64) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.outstanding = add_demand(state.outstanding, n);
        let current = state.current.clone();
        drop(state);

        current.request(n);
    }

    fn cancel(&self) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        let current = state.current.clone();
        drop(state);

        current.cancel();
    }
}

impl std::fmt::Debug for SequentialSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SequentialSubscription")
            .field("outstanding", &state.outstanding)
            .field("cancelled", &state.cancelled)
            .field("switches", &state.switches)
            .finish()
    }
}
