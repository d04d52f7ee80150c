//! Turn loop that turns a seed, a config and two fighters into a fight.
//!
//! # Turn
//!
//! 1. the acting side alternates, starting from a seeded initiative roll
//! 2. an action kind is drawn from the weighted table
//! 3. damage is computed and applied to the other side
//! 4. on a damaging turn, injury and (death-enabled only) death are rolled
//!    independently against the target
//!
//! # Termination
//!
//! Checked after every turn, in priority order: a successful death roll, then
//! a knockout (health at zero), then the action cap, where remaining health
//! decides and exact ties go to the lexicographically lower participant id.

use super::action::ActionKind;
use super::fighter::{Fighter, FighterState};
use super::log::{LogEntry, StatusEffect, log_digest};
use super::rng::{PcgRng, RngOracle, compute_seed, context};
use crate::config::CombatConfig;
use crate::error::{CombatError, ErrorKind};
use crate::lifecycle::WinMethod;
use crate::types::ParticipantId;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("fighter {id} appears on both sides")]
    DuplicateFighter { id: ParticipantId },

    #[error("fighter {id} starts with no health")]
    NoHealth { id: ParticipantId },

    #[error("combat config out of bounds: {config:?}")]
    ConfigOutOfBounds { config: CombatConfig },
}

impl CombatError for SimulationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateFighter { .. } => "simulation.duplicate_fighter",
            Self::NoHealth { .. } => "simulation.no_health",
            Self::ConfigOutOfBounds { .. } => "simulation.config_out_of_bounds",
        }
    }
}

/// Result of a full simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub entries: Vec<LogEntry>,
    pub winner: ParticipantId,
    pub method: WinMethod,
    /// Turns played.
    pub total_actions: u32,
    pub final_health: [u32; 2],
}

impl SimulationOutcome {
    pub fn digest(&self) -> [u8; 32] {
        log_digest(&self.entries)
    }
}

/// Deterministic combat simulator.
#[derive(Clone, Debug, Default)]
pub struct CombatSimulator<R = PcgRng> {
    rng: R,
}

impl CombatSimulator<PcgRng> {
    pub fn new() -> Self {
        Self { rng: PcgRng }
    }
}

impl<R: RngOracle> CombatSimulator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Runs the whole fight eagerly.
    pub fn simulate(
        &self,
        seed: u64,
        config: &CombatConfig,
        fighters: &[Fighter; 2],
    ) -> Result<SimulationOutcome, SimulationError> {
        validate(config, fighters)?;

        let mut fight = Fight {
            rng: &self.rng,
            seed,
            config,
            fighters,
            states: [
                FighterState::from_stats(&fighters[0].stats),
                FighterState::from_stats(&fighters[1].stats),
            ],
            entries: Vec::with_capacity(config.max_actions as usize * 2),
        };

        let first = (self
            .rng
            .next_u32(compute_seed(seed, 0, 0, context::INITIATIVE))
            % 2) as usize;

        for turn in 0..config.max_actions {
            let actor = (first + turn as usize) % 2;
            if let Some(method) = fight.play_turn(turn, actor) {
                return Ok(fight.finish(fighters[actor].id.clone(), method, turn + 1));
            }
        }

        let winner = technical_winner(fighters, &fight.states).clone();
        Ok(fight.finish(winner, WinMethod::Technical, config.max_actions))
    }
}

fn validate(config: &CombatConfig, fighters: &[Fighter; 2]) -> Result<(), SimulationError> {
    if !config.is_within_bounds() {
        return Err(SimulationError::ConfigOutOfBounds { config: *config });
    }
    if fighters[0].id == fighters[1].id {
        return Err(SimulationError::DuplicateFighter {
            id: fighters[0].id.clone(),
        });
    }
    if let Some(fighter) = fighters.iter().find(|f| f.stats.health == 0) {
        return Err(SimulationError::NoHealth {
            id: fighter.id.clone(),
        });
    }
    Ok(())
}

/// Higher remaining health wins; exact ties go to the lower id.
fn technical_winner<'a>(fighters: &'a [Fighter; 2], states: &[FighterState; 2]) -> &'a ParticipantId {
    let (a, b) = (&fighters[0], &fighters[1]);
    match states[0].health.cmp(&states[1].health) {
        std::cmp::Ordering::Greater => &a.id,
        std::cmp::Ordering::Less => &b.id,
        std::cmp::Ordering::Equal => std::cmp::min(&a.id, &b.id),
    }
}

struct Fight<'a, R> {
    rng: &'a R,
    seed: u64,
    config: &'a CombatConfig,
    fighters: &'a [Fighter; 2],
    states: [FighterState; 2],
    entries: Vec<LogEntry>,
}

impl<R: RngOracle> Fight<'_, R> {
    fn roll_seed(&self, turn: u32, actor: usize, ctx: u32) -> u64 {
        compute_seed(self.seed, turn, actor as u32, ctx)
    }

    /// Plays one turn; returns the win method if it ended the fight.
    fn play_turn(&mut self, turn: u32, actor: usize) -> Option<WinMethod> {
        let target = 1 - actor;
        let kind = ActionKind::draw(
            self.rng
                .roll_d100(self.roll_seed(turn, actor, context::ACTION)),
        );

        let damage = self.resolve_action(turn, actor, target, kind);
        let narration = self.narrate(actor, target, kind, damage);
        self.push(turn, actor, kind, damage, None, narration);

        if damage == 0 {
            return self.states[target].is_down().then_some(WinMethod::Knockout);
        }

        let injury = self.config.injury_chance_percent;
        if self
            .rng
            .chance(self.roll_seed(turn, actor, context::INJURY), injury)
        {
            let state = &mut self.states[target];
            let penalty = (state.strength / 10).max(1);
            state.strength = state
                .strength
                .saturating_sub(penalty)
                .max(FighterState::MIN_STRENGTH);
            let narration = format!("{} is injured and loses {} strength", self.name(target), penalty);
            self.push(
                turn,
                actor,
                kind,
                0,
                Some(StatusEffect::Injury { penalty }),
                narration,
            );
        }

        let death = self.config.death_chance_percent;
        if self.config.death_possible()
            && self
                .rng
                .chance(self.roll_seed(turn, actor, context::DEATH), death)
        {
            self.states[target].health = 0;
            let narration = format!("{} falls and does not rise again", self.name(target));
            self.push(turn, actor, kind, 0, Some(StatusEffect::Death), narration);
            return Some(WinMethod::Death);
        }

        self.states[target].is_down().then_some(WinMethod::Knockout)
    }

    /// Applies the action's effects and returns the damage dealt.
    fn resolve_action(&mut self, turn: u32, actor: usize, target: usize, kind: ActionKind) -> u32 {
        let attacker = self.states[actor];
        match kind {
            ActionKind::Defense => {
                self.states[actor].guarded = true;
                return 0;
            }
            ActionKind::Movement => {
                self.states[actor].momentum = (attacker.agility / 2).max(1);
                return 0;
            }
            ActionKind::Buff => {
                self.states[actor].strength = attacker.strength.saturating_add(2);
                return 0;
            }
            ActionKind::Miss => return 0,
            ActionKind::Attack | ActionKind::Special | ActionKind::Counter | ActionKind::Critical => {}
        }

        let roll = self.rng.range(
            self.roll_seed(turn, actor, context::DAMAGE),
            attacker.strength / 2,
            attacker.strength,
        );
        // Roster stats are unbounded; damage saturates instead of wrapping.
        let base = match kind {
            ActionKind::Special => roll.saturating_add(roll / 2).saturating_add(2),
            ActionKind::Counter => roll.saturating_add(attacker.agility / 4),
            ActionKind::Critical => roll.saturating_mul(2),
            _ => roll,
        }
        .saturating_add(attacker.momentum);

        let defender = self.states[target];
        let mut damage = base.saturating_sub(defender.defense / 2).max(1);
        if defender.guarded {
            damage = (damage / 2).max(1);
            self.states[target].guarded = false;
        }
        self.states[actor].momentum = 0;

        let state = &mut self.states[target];
        state.health = state.health.saturating_sub(damage);
        damage
    }

    fn push(
        &mut self,
        turn: u32,
        actor: usize,
        kind: ActionKind,
        damage: u32,
        effect: Option<StatusEffect>,
        narration: String,
    ) {
        let target = 1 - actor;
        let sequence = self.entries.len() as u32;
        self.entries.push(LogEntry {
            sequence,
            turn,
            offset_ms: sequence as u64 * self.config.action_interval_millis(),
            actor_id: self.fighters[actor].id.clone(),
            target_id: self.fighters[target].id.clone(),
            action_kind: kind,
            damage,
            effect,
            health_after: self.states[target].health,
            narration,
        });
    }

    fn name(&self, index: usize) -> &str {
        self.fighters[index].id.as_str()
    }

    fn narrate(&self, actor: usize, target: usize, kind: ActionKind, damage: u32) -> String {
        let (a, t) = (self.name(actor), self.name(target));
        match kind {
            ActionKind::Attack => format!("{a} strikes {t} for {damage}"),
            ActionKind::Defense => format!("{a} raises their guard"),
            ActionKind::Special => format!("{a} unleashes a signature move on {t} for {damage}"),
            ActionKind::Movement => format!("{a} circles {t}, looking for an opening"),
            ActionKind::Counter => format!("{a} counters {t} for {damage}"),
            ActionKind::Buff => format!("{a} steels themselves"),
            ActionKind::Miss => format!("{a} swings at {t} and misses"),
            ActionKind::Critical => format!("{a} lands a critical blow on {t} for {damage}"),
        }
    }

    fn finish(self, winner: ParticipantId, method: WinMethod, total_actions: u32) -> SimulationOutcome {
        SimulationOutcome {
            entries: self.entries,
            winner,
            method,
            total_actions,
            final_health: [self.states[0].health, self.states[1].health],
        }
    }
}
