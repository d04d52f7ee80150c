//! In-memory repositories for testing and development.

mod log;
mod matches;

pub use log::InMemoryLogRepository;
pub use matches::InMemoryMatchRepository;
