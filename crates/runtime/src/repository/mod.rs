//! Repository layer for match records and combat logs.
//!
//! Both traits have an in-memory implementation for tests and demos, and a
//! file-backed one: JSON documents for match records, length-prefixed bincode
//! records for the append-only logs.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::{FileLogRepository, FileMatchRepository};
pub use memory::{InMemoryLogRepository, InMemoryMatchRepository};
pub use traits::{LogRepository, MatchRepository};
