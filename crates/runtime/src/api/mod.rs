//! Public engine API surface.
//!
//! [`errors`] holds the unified error type; [`gateway`] is the
//! credential-checked front door over [`CombatEngine`](crate::CombatEngine).

pub mod errors;
pub mod gateway;

pub use errors::{EngineError, Result};
pub use gateway::Gateway;
