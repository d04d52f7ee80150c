//! File-backed repositories.

mod log;
mod matches;

pub use log::FileLogRepository;
pub use matches::FileMatchRepository;
