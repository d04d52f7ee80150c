use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use combat_core::{CombatError, ErrorKind, LogEntry, MatchId, MatchStatus};

use super::stream::{LogStream, Subscription};
use crate::repository::{LogRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("log for {match_id} is closed ({status})")]
    Closed {
        match_id: MatchId,
        status: MatchStatus,
    },

    #[error("log for {match_id} expected sequence {expected}, got {found}")]
    OutOfOrder {
        match_id: MatchId,
        expected: u32,
        found: u32,
    },

    #[error("log entry {sequence} for {match_id} is malformed")]
    Malformed { match_id: MatchId, sequence: u32 },

    #[error("broadcaster lock for {match_id} was poisoned")]
    LockPoisoned { match_id: MatchId },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CombatError for BroadcastError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Closed { .. } | Self::OutOfOrder { .. } => ErrorKind::Conflict,
            Self::Malformed { .. } => ErrorKind::InvalidArgument,
            Self::LockPoisoned { .. } | Self::Repository(_) => ErrorKind::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "broadcast.closed",
            Self::OutOfOrder { .. } => "broadcast.out_of_order",
            Self::Malformed { .. } => "broadcast.malformed",
            Self::LockPoisoned { .. } => "broadcast.lock_poisoned",
            Self::Repository(e) => e.error_code(),
        }
    }
}

/// Message carried on the live channel.
#[derive(Clone, Debug)]
pub(super) enum Signal {
    Entry(LogEntry),
    Closed(MatchStatus),
}

pub(super) struct State {
    pub(super) history: Vec<LogEntry>,
    pub(super) closed: Option<MatchStatus>,
    tx: broadcast::Sender<Signal>,
}

/// Single-writer, many-reader log for one match.
pub struct LogBroadcaster {
    match_id: MatchId,
    logs: Arc<dyn LogRepository>,
    state: Mutex<State>,
}

impl LogBroadcaster {
    pub fn new(match_id: MatchId, logs: Arc<dyn LogRepository>, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            match_id,
            logs,
            state: Mutex::new(State {
                history: Vec::new(),
                closed: None,
                tx,
            }),
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Persists `entry`, then publishes it to every live subscriber.
    pub fn append(&self, entry: LogEntry) -> Result<(), BroadcastError> {
        let mut state = self.lock()?;

        if let Some(status) = state.closed {
            return Err(BroadcastError::Closed {
                match_id: self.match_id,
                status,
            });
        }

        let expected = state.history.len() as u32;
        if entry.sequence != expected {
            return Err(BroadcastError::OutOfOrder {
                match_id: self.match_id,
                expected,
                found: entry.sequence,
            });
        }
        if !entry.is_well_formed() {
            return Err(BroadcastError::Malformed {
                match_id: self.match_id,
                sequence: entry.sequence,
            });
        }

        self.logs.append(self.match_id, &entry)?;
        state.history.push(entry.clone());

        // No receivers is fine; history still serves later subscribers.
        let _ = state.tx.send(Signal::Entry(entry));
        Ok(())
    }

    /// Marks the log complete and wakes every subscriber. Idempotent.
    pub fn close(&self, status: MatchStatus) -> Result<(), BroadcastError> {
        let mut state = self.lock()?;
        if state.closed.is_some() {
            return Ok(());
        }

        state.closed = Some(status);
        let _ = state.tx.send(Signal::Closed(status));

        tracing::debug!(
            target: "arena::broadcast",
            match_id = %self.match_id,
            %status,
            entries = state.history.len(),
            subscribers = state.tx.receiver_count(),
            "log closed"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed.is_some()).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.history.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full history so far plus a stream of everything after it.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, BroadcastError> {
        let state = self.lock()?;
        let history = state.history.clone();

        let stream = match state.closed {
            Some(status) => LogStream::finished(history.len() as u32, Some(status)),
            None => LogStream::live(
                Arc::clone(self),
                state.tx.subscribe(),
                history.len() as u32,
            ),
        };

        Ok(Subscription { history, stream })
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, State>, BroadcastError> {
        self.state.lock().map_err(|_| BroadcastError::LockPoisoned {
            match_id: self.match_id,
        })
    }
}
