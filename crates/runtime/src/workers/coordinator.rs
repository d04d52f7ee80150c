//! Acceptance coordinator: the single owner of a pending match's
//! [`AcceptanceBook`].
//!
//! Both participants and the deadline timer are writers. They are serialized
//! by this task's `select!` loop: responses arrive as commands, the deadline is
//! a `sleep_until` arm. The first resolution is handed to the match worker
//! exactly once; afterwards the task keeps answering late responses from the
//! same book until every handle is dropped.

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep_until;
use tracing::{debug, info};

use combat_core::{
    AcceptanceBook, AcceptanceError, AcceptanceResponse, MatchId, ParticipantId, RespondOutcome,
    Resolution,
};

use crate::clock::MatchClock;

/// Commands accepted by the coordinator.
pub(crate) enum Command {
    Respond {
        participant: ParticipantId,
        response: AcceptanceResponse,
        reply: oneshot::Sender<Result<RespondOutcome, AcceptanceError>>,
    },
    /// Current book, for diagnostics.
    Snapshot {
        reply: oneshot::Sender<AcceptanceBook>,
    },
}

/// Final handshake result delivered to the match worker.
#[derive(Clone, Debug)]
pub(crate) struct Resolved {
    pub resolution: Resolution,
    pub book: AcceptanceBook,
}

/// Cloneable sender side of a coordinator.
#[derive(Clone)]
pub(crate) struct CoordinatorHandle {
    command_tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Forwards a response. `None` means the coordinator has already exited.
    pub(crate) async fn respond(
        &self,
        participant: ParticipantId,
        response: AcceptanceResponse,
    ) -> Option<Result<RespondOutcome, AcceptanceError>> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Respond {
                participant,
                response,
                reply,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    pub(crate) async fn snapshot(&self) -> Option<AcceptanceBook> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx.send(Command::Snapshot { reply }).await.ok()?;
        reply_rx.await.ok()
    }
}

pub(crate) struct AcceptanceCoordinator {
    match_id: MatchId,
    book: AcceptanceBook,
    clock: MatchClock,
    command_rx: mpsc::Receiver<Command>,
    resolved_tx: Option<oneshot::Sender<Resolved>>,
}

impl AcceptanceCoordinator {
    /// Creates the coordinator, its handle, and the receiver the match worker
    /// awaits for the resolution.
    pub(crate) fn new(
        match_id: MatchId,
        book: AcceptanceBook,
        clock: MatchClock,
        buffer: usize,
    ) -> (Self, CoordinatorHandle, oneshot::Receiver<Resolved>) {
        let (command_tx, command_rx) = mpsc::channel(buffer.max(1));
        let (resolved_tx, resolved_rx) = oneshot::channel();

        let coordinator = Self {
            match_id,
            book,
            clock,
            command_rx,
            resolved_tx: Some(resolved_tx),
        };

        (coordinator, CoordinatorHandle { command_tx }, resolved_rx)
    }

    /// Main loop. Returns once every handle is dropped.
    pub(crate) async fn run(mut self) {
        let deadline = self.clock.instant_at(self.book.deadline());

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = sleep_until(deadline), if !self.book.is_resolved() => {
                    // Never earlier than the deadline, even if the clock rounds down.
                    let now = self.clock.now().max(self.book.deadline());
                    if self.book.expire(now).is_some() {
                        info!(
                            target: "arena::acceptance",
                            match_id = %self.match_id,
                            "acceptance window elapsed"
                        );
                    }
                    self.announce();
                }
            }
        }

        debug!(target: "arena::acceptance", match_id = %self.match_id, "coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Respond {
                participant,
                response,
                reply,
            } => {
                let now = self.clock.now();
                let result = self.book.respond(&participant, response, now);

                match &result {
                    Ok(outcome) => debug!(
                        target: "arena::acceptance",
                        match_id = %self.match_id,
                        %participant,
                        %response,
                        recorded = outcome.recorded,
                        "response processed"
                    ),
                    Err(error) => debug!(
                        target: "arena::acceptance",
                        match_id = %self.match_id,
                        %participant,
                        %response,
                        %error,
                        "response rejected"
                    ),
                }

                self.announce();
                if reply.send(result).is_err() {
                    debug!("Respond reply channel closed (caller dropped)");
                }
            }
            Command::Snapshot { reply } => {
                if reply.send(self.book.clone()).is_err() {
                    debug!("Snapshot reply channel closed (caller dropped)");
                }
            }
        }
    }

    /// Hands the resolution to the match worker the first time one exists.
    fn announce(&mut self) {
        let Some(resolution) = self.book.resolution().cloned() else {
            return;
        };
        let Some(resolved_tx) = self.resolved_tx.take() else {
            return;
        };

        info!(
            target: "arena::acceptance",
            match_id = %self.match_id,
            ?resolution,
            "acceptance resolved"
        );

        let resolved = Resolved {
            resolution,
            book: self.book.clone(),
        };
        if resolved_tx.send(resolved).is_err() {
            debug!(
                target: "arena::acceptance",
                match_id = %self.match_id,
                "match worker gone before resolution"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::{AcceptanceStatus, CancelReason, Timestamp};
    use std::time::Duration;

    fn spawn(
        window_secs: u64,
    ) -> (CoordinatorHandle, oneshot::Receiver<Resolved>, MatchClock) {
        let clock = MatchClock::starting_at(Timestamp(0));
        let book = AcceptanceBook::new(
            "alpha".into(),
            "beta".into(),
            Timestamp(0),
            Timestamp(0).saturating_add_secs(window_secs),
        );
        let (coordinator, handle, resolved_rx) =
            AcceptanceCoordinator::new(MatchId(1), book, clock, 4);
        tokio::spawn(coordinator.run());
        (handle, resolved_rx, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn both_accept_proceeds() {
        let (handle, resolved_rx, _) = spawn(60);

        let first = handle
            .respond("alpha".into(), AcceptanceResponse::Accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.resolution, None);

        let second = handle
            .respond("beta".into(), AcceptanceResponse::Accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.resolution, Some(Resolution::Proceed));

        let resolved = resolved_rx.await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Proceed);
        assert!(
            resolved
                .book
                .acceptances()
                .iter()
                .all(|a| a.status == AcceptanceStatus::Accepted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_without_any_response() {
        let (handle, resolved_rx, clock) = spawn(60);

        let resolved = resolved_rx.await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Cancel(CancelReason::Timeout));
        assert_eq!(resolved.book.resolved_at(), Some(Timestamp(60_000)));
        assert_eq!(clock.now(), Timestamp(60_000));

        // Late accept after the timeout is a conflict; late decline is a no-op.
        let late = handle
            .respond("beta".into(), AcceptanceResponse::Accept)
            .await
            .unwrap();
        assert!(matches!(late, Err(AcceptanceError::AlreadyResolved { .. })));

        let decline = handle
            .respond("beta".into(), AcceptanceResponse::Decline)
            .await
            .unwrap()
            .unwrap();
        assert!(!decline.recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn response_at_the_deadline_loses_to_the_timer() {
        let (handle, resolved_rx, _) = spawn(10);
        handle
            .respond("alpha".into(), AcceptanceResponse::Accept)
            .await
            .unwrap()
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        let result = handle
            .respond("beta".into(), AcceptanceResponse::Accept)
            .await
            .unwrap();
        assert!(result.is_err());

        let resolved = resolved_rx.await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Cancel(CancelReason::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_handles_drop() {
        let (handle, resolved_rx, _) = spawn(60);
        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.is_resolved());

        drop(handle);
        // The worker side observes the coordinator going away unresolved.
        assert!(resolved_rx.await.is_err());
    }
}
