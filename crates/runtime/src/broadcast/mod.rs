//! Per-match fan-out of the combat log.
//!
//! A [`LogBroadcaster`] is the single writer for one match's log. Appends are
//! persisted through the [`LogRepository`](crate::repository::LogRepository)
//! before they are published, and [`LogBroadcaster::subscribe`] takes the
//! history snapshot and registers the live receiver under the same lock, so a
//! subscriber never sees a gap or a duplicate between the two.
//!
//! [`BroadcastRegistry`] maps match ids to live broadcasters; the match worker
//! removes its entry once the match is terminal.

mod broadcaster;
mod registry;
mod stream;

pub use broadcaster::{BroadcastError, LogBroadcaster};
pub use registry::BroadcastRegistry;
pub use stream::{LogStream, Subscription};
