use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, error::RecvError};

use combat_core::{LogEntry, MatchStatus};

use super::broadcaster::{LogBroadcaster, Signal};

/// History snapshot plus the live continuation after it.
#[derive(Debug)]
pub struct Subscription {
    pub history: Vec<LogEntry>,
    pub stream: LogStream,
}

impl Subscription {
    /// A subscription to a log that will never grow again.
    pub fn replay(history: Vec<LogEntry>, status: Option<MatchStatus>) -> Self {
        let next = history.len() as u32;
        Self {
            history,
            stream: LogStream::finished(next, status),
        }
    }
}

/// Ordered live tail of a match log.
///
/// Yields each sequence number exactly once, in order. A receiver that falls
/// behind the channel capacity is back-filled from the broadcaster's history.
/// Returns `None` once the match is terminal and everything was delivered.
pub struct LogStream {
    source: Option<Arc<LogBroadcaster>>,
    rx: Option<Receiver<Signal>>,
    pending: VecDeque<LogEntry>,
    next_sequence: u32,
    terminal: Option<MatchStatus>,
    finished: bool,
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("next_sequence", &self.next_sequence)
            .field("pending", &self.pending.len())
            .field("terminal", &self.terminal)
            .field("finished", &self.finished)
            .finish()
    }
}

impl LogStream {
    pub(super) fn live(source: Arc<LogBroadcaster>, rx: Receiver<Signal>, next: u32) -> Self {
        Self {
            source: Some(source),
            rx: Some(rx),
            pending: VecDeque::new(),
            next_sequence: next,
            terminal: None,
            finished: false,
        }
    }

    pub(super) fn finished(next: u32, status: Option<MatchStatus>) -> Self {
        Self {
            source: None,
            rx: None,
            pending: VecDeque::new(),
            next_sequence: next,
            terminal: status,
            finished: true,
        }
    }

    /// Sequence number the next yielded entry will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Terminal status the log closed with, once known.
    pub fn terminal_status(&self) -> Option<MatchStatus> {
        self.terminal
    }

    pub async fn next(&mut self) -> Option<LogEntry> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                self.next_sequence = entry.sequence + 1;
                return Some(entry);
            }
            if self.finished {
                self.rx = None;
                self.source = None;
                return None;
            }

            let Some(rx) = self.rx.as_mut() else {
                self.finished = true;
                continue;
            };

            match rx.recv().await {
                Ok(Signal::Entry(entry)) => {
                    let expected = self.expected();
                    if entry.sequence == expected {
                        self.pending.push_back(entry);
                    } else if entry.sequence > expected {
                        self.backfill();
                    }
                }
                Ok(Signal::Closed(status)) => {
                    self.backfill();
                    self.terminal = Some(status);
                    self.finished = true;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        target: "arena::broadcast",
                        skipped,
                        next = self.next_sequence,
                        "subscriber lagged; back-filling from history"
                    );
                    self.backfill();
                }
                Err(RecvError::Closed) => {
                    self.backfill();
                    self.finished = true;
                }
            }
        }
    }

    fn expected(&self) -> u32 {
        self.next_sequence + self.pending.len() as u32
    }

    /// Queues every history entry not yet delivered or queued.
    fn backfill(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };

        let from = self.expected() as usize;
        match source.lock() {
            Ok(state) => {
                if let Some(missing) = state.history.get(from..) {
                    self.pending.extend(missing.iter().cloned());
                }
                if let Some(status) = state.closed {
                    self.terminal = Some(status);
                    self.finished = true;
                }
            }
            Err(error) => {
                tracing::warn!(
                    target: "arena::broadcast",
                    match_id = %source.match_id(),
                    %error,
                    "ending subscriber stream"
                );
                self.finished = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryLogRepository;
    use combat_core::{ActionKind, MatchId};

    fn entry(sequence: u32) -> LogEntry {
        LogEntry {
            sequence,
            turn: sequence,
            offset_ms: 0,
            actor_id: "alpha".into(),
            target_id: "beta".into(),
            action_kind: ActionKind::Movement,
            damage: 0,
            effect: None,
            health_after: 100,
            narration: "alpha circles beta, looking for an opening".into(),
        }
    }

    fn broadcaster(capacity: usize) -> Arc<LogBroadcaster> {
        Arc::new(LogBroadcaster::new(
            MatchId(3),
            Arc::new(InMemoryLogRepository::new()),
            capacity,
        ))
    }

    #[tokio::test]
    async fn mid_match_subscriber_continues_without_gap() {
        let broadcaster = broadcaster(16);
        for seq in 0..3 {
            broadcaster.append(entry(seq)).unwrap();
        }

        let Subscription { history, mut stream } = broadcaster.subscribe().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(stream.next_sequence(), 3);

        for seq in 3..6 {
            broadcaster.append(entry(seq)).unwrap();
        }
        broadcaster.close(MatchStatus::Completed).unwrap();

        let mut seen = Vec::new();
        while let Some(entry) = stream.next().await {
            seen.push(entry.sequence);
        }
        assert_eq!(seen, vec![3, 4, 5]);
        assert_eq!(stream.terminal_status(), Some(MatchStatus::Completed));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_backfilled() {
        let broadcaster = broadcaster(2);
        let Subscription { mut stream, .. } = broadcaster.subscribe().unwrap();

        for seq in 0..10 {
            broadcaster.append(entry(seq)).unwrap();
        }
        broadcaster.close(MatchStatus::Completed).unwrap();

        let mut seen = Vec::new();
        while let Some(entry) = stream.next().await {
            seen.push(entry.sequence);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn dropping_one_subscriber_does_not_affect_others() {
        let broadcaster = broadcaster(4);
        let first = broadcaster.subscribe().unwrap();
        let Subscription {
            stream: mut second, ..
        } = broadcaster.subscribe().unwrap();
        drop(first);

        broadcaster.append(entry(0)).unwrap();
        broadcaster.close(MatchStatus::Failed).unwrap();

        assert_eq!(second.next().await.map(|e| e.sequence), Some(0));
        assert_eq!(second.next().await, None);
        assert_eq!(second.terminal_status(), Some(MatchStatus::Failed));
    }

    #[tokio::test]
    async fn replay_is_already_finished() {
        let Subscription { history, mut stream } =
            Subscription::replay(vec![entry(0), entry(1)], Some(MatchStatus::Cancelled));
        assert_eq!(history.len(), 2);
        assert_eq!(stream.next_sequence(), 2);
        assert_eq!(stream.next().await, None);
    }
}
