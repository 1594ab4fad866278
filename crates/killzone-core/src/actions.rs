//! Actions operatives can take.
//!
//! This module defines all possible actions in a match, the events that
//! result from applying them, and the reasons an action can be illegal.
//! Actions refer to operatives by roster index only, so they serialize
//! cleanly and replay against any copy of the match.

use crate::battlefield::Side;
use crate::geometry::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of an action, in priority order for action generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Shoot,
    Move,
    Dash,
}

impl ActionKind {
    /// All kinds, highest priority first
    pub const PRIORITY: [ActionKind; 3] = [ActionKind::Shoot, ActionKind::Move, ActionKind::Dash];
}

/// An action performed by one operative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Move up to the operative's movement stat
    Move { operative: usize, destination: Position },
    /// Move up to the fixed dash distance
    Dash { operative: usize, destination: Position },
    /// Shoot an enemy operative, neutralizing it
    Shoot { operative: usize, target: usize },
}

impl Action {
    /// Index of the acting operative
    pub fn operative(&self) -> usize {
        match *self {
            Action::Move { operative, .. }
            | Action::Dash { operative, .. }
            | Action::Shoot { operative, .. } => operative,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move { .. } => ActionKind::Move,
            Action::Dash { .. } => ActionKind::Dash,
            Action::Shoot { .. } => ActionKind::Shoot,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move {
                operative,
                destination,
            } => write!(f, "{} Move To {}", operative, destination),
            Action::Dash {
                operative,
                destination,
            } => write!(f, "{} Dash To {}", operative, destination),
            Action::Shoot { operative, target } => write!(f, "{} Shoot At {}", operative, target),
        }
    }
}

/// Why an action failed validation, in the order checks are made
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IllegalAction {
    #[error("Match is finished")]
    MatchFinished,

    #[error("Operative {0} does not exist")]
    UnknownOperative(usize),

    #[error("Operative {active} is mid-activation and must act")]
    ActivationInProgress { active: usize },

    #[error("Operative {0} is not ready")]
    NotReady(usize),

    #[error("Operative {0} is not on the side to play")]
    WrongSide(usize),

    #[error("Operative {0} has no action points")]
    NoActionPoints(usize),

    #[error("Destination is outside the battlefield")]
    OutOfBounds,

    #[error("Destination is {distance:.1} away, beyond the allowed {max:.1}")]
    OutOfRange { distance: f32, max: f32 },

    #[error("Destination overlaps operative {0}")]
    CollidesWithOperative(usize),

    #[error("Destination overlaps terrain piece {0}")]
    CollidesWithTerrain(usize),

    #[error("Target {0} does not exist")]
    UnknownTarget(usize),

    #[error("Target {0} is on the same side")]
    FriendlyTarget(usize),

    #[error("Target {0} is already neutralized")]
    TargetNeutralized(usize),

    #[error("Target {0} is not visible")]
    NoLineOfSight(usize),
}

/// Events that occur as a result of applying an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    /// An operative moved or dashed
    OperativeMoved {
        operative: usize,
        kind: ActionKind,
        from: Position,
        to: Position,
    },

    /// A shot neutralized its target
    OperativeNeutralized { shooter: usize, target: usize },

    /// The side to play passed
    Passed { side: Side },

    /// An operative finished its activation
    ActivationEnded { operative: usize },

    /// A turning point resolved and was scored
    TurningPointScored {
        /// 1-based number of the turning point that ended
        turning_point: u8,
        attacker: u32,
        defender: u32,
    },

    /// The side to play changed
    TurnChanged { side: Side },

    /// The last turning point resolved
    MatchFinished {
        attacker_score: u32,
        defender_score: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_accessors() {
        let shoot = Action::Shoot {
            operative: 3,
            target: 12,
        };
        assert_eq!(shoot.operative(), 3);
        assert_eq!(shoot.kind(), ActionKind::Shoot);

        let dash = Action::Dash {
            operative: 7,
            destination: Position::new(1.0, 2.0),
        };
        assert_eq!(dash.operative(), 7);
        assert_eq!(dash.kind(), ActionKind::Dash);
    }

    #[test]
    fn test_action_display() {
        let action = Action::Move {
            operative: 1,
            destination: Position::new(40.0, 40.0),
        };
        assert_eq!(action.to_string(), "1 Move To (40.0; 40.0)");
    }

    #[test]
    fn test_action_json_shape() {
        let action = Action::Shoot {
            operative: 0,
            target: 10,
        };
        let json = serde_json::to_value(action).unwrap();
        assert_eq!(json, serde_json::json!({"Shoot": {"operative": 0, "target": 10}}));

        let pass: Option<Action> = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(pass, None);
    }
}
