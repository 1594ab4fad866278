//! Core match state machine.
//!
//! This module contains the main `MatchState` struct: turn and activation
//! progression, action legality, action application and objective scoring.

use crate::actions::{Action, ActionKind, IllegalAction, MatchEvent};
use crate::battlefield::{Battlefield, Side, CIRCLE_DISTANCE};
use crate::geometry::{Intersects, Position};
use crate::operative::{OperativeState, OperativeStatus, StatusTrigger};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Number of turning points in a match
pub const MAX_TURNING_POINTS: u8 = 4;

/// Fixed range of a dash, independent of the operative's movement stat
pub const DASH_DISTANCE: f32 = 3.0 * CIRCLE_DISTANCE;

/// Initiative for every turning point, rolled once per match
pub type Initiative = [Side; MAX_TURNING_POINTS as usize];

/// Errors that can occur when driving a match
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum MatchError {
    #[error("Illegal action {action}: {reason}")]
    IllegalAction { action: Action, reason: IllegalAction },

    #[error("Match is over")]
    MatchFinished,

    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    #[error("Replay diverged: recorded {expected:?}, replayed {actual:?}")]
    ReplayDiverged {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Match did not finish within {0} steps")]
    StepLimitExceeded(usize),
}

/// The complete state of a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    /// Shared, never mutated
    battlefield: Arc<Battlefield>,
    /// Roster indexed by operative index
    operatives: Vec<OperativeState>,
    /// Number of resolved turning points (0-based current turning point)
    turning_point: u8,
    initiative: Initiative,
    current_turn: Side,
    attacker_score: u32,
    defender_score: u32,
}

impl MatchState {
    /// Create a match from a roster, a battlefield and pre-rolled initiative.
    ///
    /// Operative indices must be dense and match their position in the roster.
    /// Nobody may start mid-activation or above its action point limit, and
    /// ready operatives need at least one action point.
    pub fn new(
        battlefield: Arc<Battlefield>,
        operatives: Vec<OperativeState>,
        initiative: Initiative,
    ) -> Result<Self, MatchError> {
        if let Some((position, operative)) = operatives
            .iter()
            .enumerate()
            .find(|(i, operative)| operative.index != *i)
        {
            return Err(MatchError::InvalidRoster(format!(
                "operative at position {} has index {}",
                position, operative.index
            )));
        }

        if operatives
            .iter()
            .any(|operative| operative.status == OperativeStatus::Active)
        {
            return Err(MatchError::InvalidRoster(
                "operatives must not start mid-activation".into(),
            ));
        }

        if let Some(operative) = operatives.iter().find(|operative| {
            operative.action_points > operative.profile().action_point_limit
                || (operative.status == OperativeStatus::Ready && operative.action_points == 0)
        }) {
            return Err(MatchError::InvalidRoster(format!(
                "operative {} has {} action points (limit {})",
                operative.index,
                operative.action_points,
                operative.profile().action_point_limit
            )));
        }

        Ok(Self {
            battlefield,
            operatives,
            turning_point: 0,
            current_turn: initiative[0],
            initiative,
            attacker_score: 0,
            defender_score: 0,
        })
    }

    /// Roll a fresh initiative sequence
    pub fn roll_initiative<R: Rng + ?Sized>(rng: &mut R) -> Initiative {
        let mut initiative = [Side::Attacker; MAX_TURNING_POINTS as usize];
        for side in initiative.iter_mut() {
            *side = if rng.gen_bool(0.5) {
                Side::Attacker
            } else {
                Side::Defender
            };
        }
        initiative
    }

    /// Create a match, rolling initiative from `rng`
    pub fn with_rolled_initiative<R: Rng + ?Sized>(
        battlefield: Arc<Battlefield>,
        operatives: Vec<OperativeState>,
        rng: &mut R,
    ) -> Result<Self, MatchError> {
        let initiative = Self::roll_initiative(rng);
        Self::new(battlefield, operatives, initiative)
    }

    // ==================== Queries ====================

    pub fn battlefield(&self) -> &Battlefield {
        &self.battlefield
    }

    /// The shared battlefield handle
    pub fn battlefield_arc(&self) -> &Arc<Battlefield> {
        &self.battlefield
    }

    pub fn operatives(&self) -> &[OperativeState] {
        &self.operatives
    }

    pub fn operative(&self, index: usize) -> Option<&OperativeState> {
        self.operatives.get(index)
    }

    /// Number of resolved turning points; the current one is `turning_point() + 1`
    pub fn turning_point(&self) -> u8 {
        self.turning_point
    }

    pub fn current_turn(&self) -> Side {
        self.current_turn
    }

    pub fn initiative(&self) -> &Initiative {
        &self.initiative
    }

    pub fn attacker_score(&self) -> u32 {
        self.attacker_score
    }

    pub fn defender_score(&self) -> u32 {
        self.defender_score
    }

    pub fn is_finished(&self) -> bool {
        self.turning_point >= MAX_TURNING_POINTS
    }

    /// The operative of the side to play that is mid-activation, if any
    pub fn active_operative(&self) -> Option<usize> {
        self.operatives
            .iter()
            .find(|o| o.side == self.current_turn && o.status == OperativeStatus::Active)
            .map(|o| o.index)
    }

    /// Operatives the side to play may act with.
    ///
    /// A mid-activation operative must continue, so it is the only candidate
    /// when present. Otherwise every ready operative of the side qualifies.
    pub fn selectable_operatives(&self) -> Vec<usize> {
        if self.is_finished() {
            return Vec::new();
        }
        if let Some(active) = self.active_operative() {
            return vec![active];
        }
        self.operatives
            .iter()
            .filter(|o| o.side == self.current_turn && o.status == OperativeStatus::Ready)
            .map(|o| o.index)
            .collect()
    }

    /// Action kinds the operative has not yet tried this activation, highest priority first
    pub fn untried_actions(&self, operative: usize) -> Vec<ActionKind> {
        match self.operatives.get(operative) {
            Some(state) => ActionKind::PRIORITY
                .into_iter()
                .filter(|kind| !state.has_performed(*kind))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether any operative of either side can still act this turning point
    pub fn turning_point_finished(&self) -> bool {
        !self.operatives.iter().any(|o| o.status.is_pending())
    }

    /// Maximum travel distance for a movement action kind
    pub fn movement_range(&self, operative: usize, kind: ActionKind) -> Option<f32> {
        let state = self.operatives.get(operative)?;
        match kind {
            ActionKind::Move => Some(state.profile().movement),
            ActionKind::Dash => Some(DASH_DISTANCE),
            ActionKind::Shoot => None,
        }
    }

    /// Whether the straight line between two points is unobstructed
    pub fn has_line_of_sight(&self, from: Position, to: Position) -> bool {
        self.battlefield.has_line_of_sight(from, to)
    }

    /// Enemies of the operative that are alive and visible from it
    pub fn visible_targets(&self, operative: usize) -> Vec<usize> {
        let Some(shooter) = self.operatives.get(operative) else {
            return Vec::new();
        };
        self.operatives
            .iter()
            .filter(|o| o.side != shooter.side && !o.is_neutralized())
            .filter(|o| self.has_line_of_sight(shooter.position, o.position))
            .map(|o| o.index)
            .collect()
    }

    // ==================== Legality ====================

    /// Whether an action may be applied right now
    pub fn is_action_valid(&self, action: &Action) -> bool {
        self.validate_action(action).is_ok()
    }

    /// Run the legality checks in order and report the first failure
    pub fn validate_action(&self, action: &Action) -> Result<(), IllegalAction> {
        if self.is_finished() {
            return Err(IllegalAction::MatchFinished);
        }

        let index = action.operative();
        let actor = self
            .operatives
            .get(index)
            .ok_or(IllegalAction::UnknownOperative(index))?;

        match self.active_operative() {
            Some(active) if active != index => {
                return Err(IllegalAction::ActivationInProgress { active });
            }
            Some(_) => {}
            None => {
                if actor.status != OperativeStatus::Ready {
                    return Err(IllegalAction::NotReady(index));
                }
            }
        }

        if actor.side != self.current_turn {
            return Err(IllegalAction::WrongSide(index));
        }

        if actor.action_points == 0 {
            return Err(IllegalAction::NoActionPoints(index));
        }

        match *action {
            Action::Move { destination, .. } => {
                self.validate_move(actor, destination, actor.profile().movement)
            }
            Action::Dash { destination, .. } => {
                self.validate_move(actor, destination, DASH_DISTANCE)
            }
            Action::Shoot { target, .. } => self.validate_shoot(actor, target),
        }
    }

    /// Spatial checks shared by moves and dashes
    pub fn validate_move(
        &self,
        actor: &OperativeState,
        destination: Position,
        max_distance: f32,
    ) -> Result<(), IllegalAction> {
        if !self
            .battlefield
            .contains_base(destination, actor.base_radius())
        {
            return Err(IllegalAction::OutOfBounds);
        }

        let distance = actor.position.distance_to(destination);
        if distance > max_distance {
            return Err(IllegalAction::OutOfRange {
                distance,
                max: max_distance,
            });
        }

        let base = actor.base_at(destination);

        if let Some(other) = self.operatives.iter().find(|other| {
            other.index != actor.index && !other.is_neutralized() && base.intersects(&other.base())
        }) {
            return Err(IllegalAction::CollidesWithOperative(other.index));
        }

        if let Some(terrain) = self.battlefield.blocking_terrain(&base) {
            return Err(IllegalAction::CollidesWithTerrain(terrain));
        }

        Ok(())
    }

    fn validate_shoot(&self, actor: &OperativeState, target: usize) -> Result<(), IllegalAction> {
        let victim = self
            .operatives
            .get(target)
            .ok_or(IllegalAction::UnknownTarget(target))?;

        if victim.side == actor.side {
            return Err(IllegalAction::FriendlyTarget(target));
        }

        if victim.is_neutralized() {
            return Err(IllegalAction::TargetNeutralized(target));
        }

        if !self.has_line_of_sight(actor.position, victim.position) {
            return Err(IllegalAction::NoLineOfSight(target));
        }

        Ok(())
    }

    // ==================== Transitions ====================

    /// Apply an action, or pass with `None`.
    ///
    /// Callers are expected to validate first: an illegal action is rejected
    /// with `MatchError::IllegalAction` and leaves the state untouched.
    pub fn apply_action(&mut self, action: Option<Action>) -> Result<Vec<MatchEvent>, MatchError> {
        if self.is_finished() {
            return Err(MatchError::MatchFinished);
        }

        let mut events = Vec::new();

        let Some(action) = action else {
            self.pass(&mut events);
            return Ok(events);
        };

        self.validate_action(&action)
            .map_err(|reason| MatchError::IllegalAction { action, reason })?;

        let index = action.operative();

        match action {
            Action::Move { destination, .. } | Action::Dash { destination, .. } => {
                let actor = &mut self.operatives[index];
                let from = actor.position;
                actor.position = destination;
                actor.performed_actions.insert(action.kind());
                events.push(MatchEvent::OperativeMoved {
                    operative: index,
                    kind: action.kind(),
                    from,
                    to: destination,
                });
            }

            Action::Shoot { target, .. } => {
                self.operatives[target].apply_trigger(StatusTrigger::Shot);
                self.operatives[index]
                    .performed_actions
                    .insert(ActionKind::Shoot);
                events.push(MatchEvent::OperativeNeutralized {
                    shooter: index,
                    target,
                });
            }
        }

        let actor = &mut self.operatives[index];
        actor.action_points -= 1;
        let points_left = actor.action_points;
        actor.apply_trigger(StatusTrigger::ActionTaken { points_left });

        if points_left == 0 {
            events.push(MatchEvent::ActivationEnded { operative: index });
            self.end_activation(&mut events);
        }

        Ok(events)
    }

    /// The side to play gives up the rest of its activation, or its turn
    fn pass(&mut self, events: &mut Vec<MatchEvent>) {
        events.push(MatchEvent::Passed {
            side: self.current_turn,
        });

        if let Some(active) = self.active_operative() {
            self.operatives[active].apply_trigger(StatusTrigger::ActivationForfeited);
            events.push(MatchEvent::ActivationEnded { operative: active });
        }

        self.end_activation(events);
    }

    /// Resolve the turning point if nobody can act, otherwise hand over the turn
    fn end_activation(&mut self, events: &mut Vec<MatchEvent>) {
        if self.turning_point_finished() {
            self.resolve_turning_point(events);
        } else {
            self.current_turn = self.current_turn.opponent();
            events.push(MatchEvent::TurnChanged {
                side: self.current_turn,
            });
        }
    }

    fn resolve_turning_point(&mut self, events: &mut Vec<MatchEvent>) {
        let (attacker, defender) = self.count_captured_objectives();
        self.attacker_score += attacker;
        self.defender_score += defender;
        self.turning_point += 1;

        debug!(
            turning_point = self.turning_point,
            attacker, defender, "turning point resolved"
        );
        events.push(MatchEvent::TurningPointScored {
            turning_point: self.turning_point,
            attacker,
            defender,
        });

        if self.is_finished() {
            info!(
                attacker_score = self.attacker_score,
                defender_score = self.defender_score,
                "match finished"
            );
            events.push(MatchEvent::MatchFinished {
                attacker_score: self.attacker_score,
                defender_score: self.defender_score,
            });
            return;
        }

        for operative in &mut self.operatives {
            operative.refresh();
        }

        self.current_turn = self.initiative[self.turning_point as usize];
        events.push(MatchEvent::TurnChanged {
            side: self.current_turn,
        });
    }

    // ==================== Scoring ====================

    /// Live operatives of `side` controlling the objective at `objective`
    pub fn controlling_operatives(&self, objective: usize, side: Side) -> usize {
        let Some(marker) = self.battlefield.objectives.get(objective) else {
            return 0;
        };
        self.operatives
            .iter()
            .filter(|o| o.side == side && !o.is_neutralized())
            .filter(|o| marker.is_within_control_range(o.position, o.base_radius()))
            .count()
    }

    /// Objectives each side currently holds by strict majority: `(attacker, defender)`
    pub fn count_captured_objectives(&self) -> (u32, u32) {
        let mut attacker = 0;
        let mut defender = 0;

        for objective in 0..self.battlefield.objectives.len() {
            let attackers = self.controlling_operatives(objective, Side::Attacker);
            let defenders = self.controlling_operatives(objective, Side::Defender);

            if attackers > defenders {
                attacker += 1;
            } else if defenders > attackers {
                defender += 1;
            }
        }

        (attacker, defender)
    }
}
