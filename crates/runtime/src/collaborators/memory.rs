//! In-process collaborators.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use async_trait::async_trait;

use combat_core::{Arena, ArenaId, CombatMatch, CombatantStats, ParticipantId, ServerId};

use super::{AccessPolicy, ArenaDirectory, CollaboratorError, Identity, IdentityResolver, Roster};

/// Fixed credential table.
#[derive(Default)]
pub struct StaticIdentityResolver {
    credentials: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential: impl Into<String>, identity: Identity) -> Self {
        self.credentials.insert(credential.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Identity, CollaboratorError> {
        self.credentials
            .get(credential)
            .cloned()
            .ok_or(CollaboratorError::Unauthorized)
    }
}

#[derive(Clone, Debug)]
struct Profile {
    server: ServerId,
    stats: CombatantStats,
}

impl Profile {
    fn new(server: impl Into<ServerId>, stats: CombatantStats) -> Self {
        Self {
            server: server.into(),
            stats,
        }
    }
}

/// Mutable roster; worlds can be changed to exercise the proceed re-check.
#[derive(Default)]
pub struct InMemoryRoster {
    profiles: RwLock<HashMap<ParticipantId, Profile>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        participant: impl Into<ParticipantId>,
        server: impl Into<ServerId>,
        stats: CombatantStats,
    ) -> Self {
        if let Ok(profiles) = self.profiles.get_mut() {
            profiles.insert(participant.into(), Profile::new(server, stats));
        }
        self
    }

    pub fn insert(
        &self,
        participant: impl Into<ParticipantId>,
        server: impl Into<ServerId>,
        stats: CombatantStats,
    ) -> Result<(), CollaboratorError> {
        self.write()?
            .insert(participant.into(), Profile::new(server, stats));
        Ok(())
    }

    /// Moves a participant to another world. Returns false if unknown.
    pub fn transfer(
        &self,
        participant: &ParticipantId,
        server: impl Into<ServerId>,
    ) -> Result<bool, CollaboratorError> {
        Ok(match self.write()?.get_mut(participant) {
            Some(profile) => {
                profile.server = server.into();
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, participant: &ParticipantId) -> Result<bool, CollaboratorError> {
        Ok(self.write()?.remove(participant).is_some())
    }

    fn profile(&self, participant: &ParticipantId) -> Result<Profile, CollaboratorError> {
        let profiles = self.profiles.read().map_err(|_| poisoned())?;

        profiles
            .get(participant)
            .cloned()
            .ok_or_else(|| CollaboratorError::participant_not_found(participant))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<ParticipantId, Profile>>, CollaboratorError> {
        self.profiles.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> CollaboratorError {
    CollaboratorError::Unavailable {
        service: "roster",
        reason: "lock poisoned".into(),
    }
}

#[async_trait]
impl Roster for InMemoryRoster {
    async fn world_of(&self, participant: &ParticipantId) -> Result<ServerId, CollaboratorError> {
        self.profile(participant).map(|profile| profile.server)
    }

    async fn stats_of(
        &self,
        participant: &ParticipantId,
    ) -> Result<CombatantStats, CollaboratorError> {
        self.profile(participant).map(|profile| profile.stats)
    }
}

#[derive(Default)]
pub struct InMemoryArenaDirectory {
    arenas: HashMap<ArenaId, Arena>,
}

impl InMemoryArenaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, arena: Arena) -> Self {
        self.arenas.insert(arena.id.clone(), arena);
        self
    }
}

#[async_trait]
impl ArenaDirectory for InMemoryArenaDirectory {
    async fn arena(&self, id: &ArenaId) -> Result<Arena, CollaboratorError> {
        self.arenas
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::arena_not_found(id))
    }
}

/// Only the two participants (and operators) may watch.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParticipantsOnly;

impl AccessPolicy for ParticipantsOnly {
    fn can_watch(&self, identity: &Identity, record: &CombatMatch) -> bool {
        identity.operator || record.is_participant(&identity.participant)
    }
}

/// Participants plus any spectator from the match's own world.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameWorldSpectators;

impl AccessPolicy for SameWorldSpectators {
    fn can_watch(&self, identity: &Identity, record: &CombatMatch) -> bool {
        identity.operator
            || record.is_participant(&identity.participant)
            || record.participants[0].server == identity.server
    }
}
