//! Per-match background tasks.
//!
//! Each pending match gets an acceptance coordinator (owns the handshake
//! until it resolves) and a match worker (owns everything after).

mod coordinator;
mod match_worker;

pub(crate) use coordinator::{AcceptanceCoordinator, CoordinatorHandle};
pub(crate) use match_worker::MatchWorker;
