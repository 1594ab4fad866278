//! Decision providers.
//!
//! A decision provider looks at a match and returns one action for the side
//! to play, or `None` to pass. This module provides:
//! - The `DecisionProvider` trait (also implemented for closures)
//! - `DefaultPolicy`: the reference random provider

use crate::actions::{Action, ActionKind};
use crate::game::MatchState;
use crate::geometry::Position;
use rand::prelude::*;
use std::f32::consts::TAU;
use tracing::warn;

/// Attempts at sampling a legal destination before standing still
pub const MAX_MOVE_ATTEMPTS: usize = 100;

/// Something that chooses actions for the side to play
pub trait DecisionProvider {
    /// Choose an action for `state.current_turn()`, or `None` to pass.
    ///
    /// A returned action must satisfy `MatchState::is_action_valid`.
    fn decide(&mut self, state: &MatchState) -> Option<Action>;
}

impl<F> DecisionProvider for F
where
    F: FnMut(&MatchState) -> Option<Action>,
{
    fn decide(&mut self, state: &MatchState) -> Option<Action> {
        self(state)
    }
}

/// Random reference policy used when no external provider is supplied
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    rng: StdRng,
}

impl DefaultPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The operative that must continue, else a random ready one
    pub fn select_operative(&mut self, state: &MatchState) -> Option<usize> {
        state.selectable_operatives().choose(&mut self.rng).copied()
    }

    /// First legal action by priority Shoot > Move > Dash, skipping kinds
    /// already performed this activation
    pub fn generate_action(&mut self, state: &MatchState, operative: usize) -> Option<Action> {
        for kind in state.untried_actions(operative) {
            let candidate = match kind {
                ActionKind::Shoot => self.shoot_action(state, operative),
                ActionKind::Move | ActionKind::Dash => self.move_action(state, operative, kind),
            };

            if let Some(action) = candidate.filter(|action| state.is_action_valid(action)) {
                return Some(action);
            }
        }
        None
    }

    /// Shoot a random visible enemy, if any
    pub fn shoot_action(&mut self, state: &MatchState, operative: usize) -> Option<Action> {
        let mut targets = state.visible_targets(operative);
        targets.shuffle(&mut self.rng);

        targets
            .into_iter()
            .map(|target| Action::Shoot { operative, target })
            .find(|action| state.is_action_valid(action))
    }

    /// Move or dash to a random legal destination.
    ///
    /// Samples uniformly inside the disc of allowed range. After
    /// `MAX_MOVE_ATTEMPTS` failures the operative stays where it is, which
    /// still spends the action.
    pub fn move_action(
        &mut self,
        state: &MatchState,
        operative: usize,
        kind: ActionKind,
    ) -> Option<Action> {
        let origin = state.operative(operative)?.position;
        let range = state.movement_range(operative, kind)?;
        let build = |destination: Position| match kind {
            ActionKind::Dash => Action::Dash {
                operative,
                destination,
            },
            _ => Action::Move {
                operative,
                destination,
            },
        };

        for _ in 0..MAX_MOVE_ATTEMPTS {
            let action = build(self.sample_in_disc(origin, range));
            if state.is_action_valid(&action) {
                return Some(action);
            }
        }

        warn!(operative, ?kind, "no valid destination found, staying in place");
        Some(build(origin))
    }

    fn sample_in_disc(&mut self, center: Position, radius: f32) -> Position {
        let distance = radius * self.rng.gen::<f32>().sqrt();
        let angle = TAU * self.rng.gen::<f32>();
        center + Position::new(angle.cos(), angle.sin()) * distance
    }
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionProvider for DefaultPolicy {
    fn decide(&mut self, state: &MatchState) -> Option<Action> {
        let operative = self.select_operative(state)?;
        self.generate_action(state, operative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::{Battlefield, Side, Terrain, TerrainKind};
    use crate::operative::{standard_roster, OperativeState, OperativeType};
    use std::sync::Arc;

    fn kommando(index: usize, x: f32, y: f32) -> OperativeState {
        OperativeState::new(index, OperativeType::KommandoBoy, Side::Attacker, Position::new(x, y))
    }

    fn veteran(index: usize, x: f32, y: f32) -> OperativeState {
        OperativeState::new(index, OperativeType::VeteranTrooper, Side::Defender, Position::new(x, y))
    }

    /// A kommando at (300, 300) walled in by four terrain blocks that leave
    /// exactly its base free
    fn boxed_in() -> MatchState {
        let mut battlefield = Battlefield::empty();
        let wall = |x: f32, y: f32, w: f32, h: f32| {
            Terrain::new(TerrainKind::HEAVY, Position::new(x, y), w, h)
        };
        battlefield.terrains.push(wall(184.0, 300.0, 200.0, 400.0));
        battlefield.terrains.push(wall(416.0, 300.0, 200.0, 400.0));
        battlefield.terrains.push(wall(300.0, 184.0, 400.0, 200.0));
        battlefield.terrains.push(wall(300.0, 416.0, 400.0, 200.0));

        MatchState::new(
            Arc::new(battlefield),
            vec![kommando(0, 300.0, 300.0), veteran(1, 650.0, 100.0)],
            [Side::Attacker; 4],
        )
        .unwrap()
    }

    #[test]
    fn test_policy_prefers_shooting_visible_enemy() {
        let state = MatchState::new(
            Arc::new(Battlefield::empty()),
            vec![kommando(0, 100.0, 100.0), veteran(1, 400.0, 400.0)],
            [Side::Attacker; 4],
        )
        .unwrap();

        let mut policy = DefaultPolicy::with_seed(7);
        assert_eq!(
            policy.decide(&state),
            Some(Action::Shoot {
                operative: 0,
                target: 1
            })
        );
    }

    #[test]
    fn test_policy_moves_when_nothing_is_visible() {
        let state = boxed_in();
        let mut policy = DefaultPolicy::with_seed(1);
        assert_eq!(policy.shoot_action(&state, 0), None);

        let action = policy.generate_action(&state, 0).unwrap();
        assert_eq!(action.kind(), ActionKind::Move);
    }

    #[test]
    fn test_stay_in_place_fallback_spends_an_action_point() {
        let mut state = boxed_in();
        let mut policy = DefaultPolicy::with_seed(3);

        let action = policy.decide(&state).unwrap();
        assert_eq!(
            action,
            Action::Move {
                operative: 0,
                destination: Position::new(300.0, 300.0)
            }
        );

        state.apply_action(Some(action)).unwrap();
        let operative = state.operative(0).unwrap();
        assert_eq!(operative.position, Position::new(300.0, 300.0));
        assert_eq!(operative.action_points, 1);
        assert!(operative.has_performed(ActionKind::Move));

        // Second action of the activation falls back to a dash in place
        let action = policy.decide(&state).unwrap();
        assert_eq!(action.kind(), ActionKind::Dash);
    }

    #[test]
    fn test_sampled_moves_are_legal() {
        let state = MatchState::new(
            Arc::new(Battlefield::standard()),
            standard_roster(),
            [Side::Attacker; 4],
        )
        .unwrap();
        let mut policy = DefaultPolicy::with_seed(11);

        for operative in 0..10 {
            for kind in [ActionKind::Move, ActionKind::Dash] {
                let action = policy.move_action(&state, operative, kind).unwrap();
                assert!(state.is_action_valid(&action), "{} should be legal", action);
            }
        }
    }

    #[test]
    fn test_seeded_policies_agree() {
        let state = MatchState::new(
            Arc::new(Battlefield::standard()),
            standard_roster(),
            [Side::Defender; 4],
        )
        .unwrap();

        let mut a = DefaultPolicy::with_seed(42);
        let mut b = DefaultPolicy::with_seed(42);
        for _ in 0..10 {
            assert_eq!(a.decide(&state), b.decide(&state));
        }
    }

    #[test]
    fn test_no_selectable_operative_means_pass() {
        let mut state = MatchState::new(
            Arc::new(Battlefield::empty()),
            vec![kommando(0, 100.0, 100.0), veteran(1, 400.0, 400.0), veteran(2, 500.0, 400.0)],
            [Side::Attacker; 4],
        )
        .unwrap();

        // Attacker uses its only operative
        state.apply_action(Some(Action::Move {
            operative: 0,
            destination: Position::new(100.0, 120.0),
        }))
        .unwrap();
        state.apply_action(Some(Action::Dash {
            operative: 0,
            destination: Position::new(100.0, 140.0),
        }))
        .unwrap();
        state.apply_action(Some(Action::Move {
            operative: 1,
            destination: Position::new(400.0, 420.0),
        }))
        .unwrap();
        state.apply_action(Some(Action::Dash {
            operative: 1,
            destination: Position::new(400.0, 440.0),
        }))
        .unwrap();

        // Back to the attacker, who has nobody left to activate
        assert_eq!(state.current_turn(), Side::Attacker);
        let mut policy = DefaultPolicy::with_seed(5);
        assert_eq!(policy.decide(&state), None);
    }

    #[test]
    fn test_closure_is_a_decision_provider() {
        let state = boxed_in();
        let mut always_pass = |_: &MatchState| -> Option<Action> { None };
        assert_eq!(always_pass.decide(&state), None);
    }
}
