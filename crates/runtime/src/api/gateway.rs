//! Transport-agnostic entry point for callers that present a credential.
//!
//! Every operation resolves the credential first, so an unknown credential
//! fails with `Unauthorized` before any match data is read.

use std::sync::Arc;

use tracing::debug;

use combat_core::{
    AcceptanceResponse, ArenaId, CombatConfig, CombatMatch, MatchId, MatchSummary, ParticipantId,
    RespondOutcome, WinMethod,
};

use super::Result;
use crate::broadcast::Subscription;
use crate::collaborators::{Identity, IdentityResolver};
use crate::engine::CombatEngine;

#[derive(Clone)]
pub struct Gateway {
    engine: Arc<CombatEngine>,
    resolver: Arc<dyn IdentityResolver>,
}

impl Gateway {
    pub fn new(engine: Arc<CombatEngine>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { engine, resolver }
    }

    pub fn engine(&self) -> &Arc<CombatEngine> {
        &self.engine
    }

    async fn authenticate(&self, credential: &str) -> Result<Identity> {
        let identity = self.resolver.resolve(credential).await?;
        debug!(
            target: "arena::gateway",
            participant = %identity.participant,
            server = %identity.server,
            operator = identity.operator,
            "caller authenticated"
        );
        Ok(identity)
    }

    pub async fn status(&self, credential: &str, match_id: MatchId) -> Result<MatchSummary> {
        let caller = self.authenticate(credential).await?;
        self.engine.status(match_id, &caller).await
    }

    /// Responds on behalf of the authenticated participant.
    pub async fn respond(
        &self,
        credential: &str,
        match_id: MatchId,
        response: AcceptanceResponse,
    ) -> Result<RespondOutcome> {
        let caller = self.authenticate(credential).await?;
        self.engine
            .respond(match_id, &caller.participant, response)
            .await
    }

    pub async fn watch(&self, credential: &str, match_id: MatchId) -> Result<Subscription> {
        let caller = self.authenticate(credential).await?;
        self.engine.watch(match_id, &caller).await
    }

    pub async fn resolve_config(&self, credential: &str, arena: &ArenaId) -> Result<CombatConfig> {
        self.authenticate(credential).await?;
        self.engine.resolve_config(arena).await
    }

    pub async fn force_complete(
        &self,
        credential: &str,
        match_id: MatchId,
        winner: ParticipantId,
        method: WinMethod,
        reason: &str,
    ) -> Result<CombatMatch> {
        let caller = self.authenticate(credential).await?;
        self.engine
            .force_complete(match_id, &caller, winner, method, reason)
            .await
    }
}
