//! Operative archetypes and per-unit match state.
//!
//! This module contains:
//! - `OperativeType` archetypes with their static profiles
//! - `OperativeStatus` and its explicit transition table
//! - `ActionSet`, the per-activation record of performed action kinds
//! - `OperativeState`, the mutable per-unit state owned by a match
//! - The standard symmetric roster

use crate::actions::ActionKind;
use crate::battlefield::{Side, CIRCLE_DISTANCE, TOTAL_HEIGHT, TOTAL_WIDTH};
use crate::geometry::{Circle, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of operatives each side fields in the standard roster
pub const OPERATIVES_PER_SIDE: usize = 10;

/// Distance of the first operative from the board edges in the standard roster
const ROSTER_MARGIN: f32 = 30.0;

/// Spacing between operatives along the baseline in the standard roster
const ROSTER_SPACING: f32 = 40.0;

/// Static profile shared by every operative of one archetype
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: &'static str,
    /// Base diameter in millimetres
    pub base_diameter: f32,
    /// Maximum distance of a normal move
    pub movement: f32,
    pub action_point_limit: u8,
    pub defence: u8,
    pub save: u8,
    pub wounds: u8,
}

const KOMMANDO_BOY: Profile = Profile {
    name: "Kommando Boy",
    base_diameter: 32.0,
    movement: 3.0 * CIRCLE_DISTANCE,
    action_point_limit: 2,
    defence: 3,
    save: 5,
    wounds: 10,
};

const VETERAN_TROOPER: Profile = Profile {
    name: "Veteran Trooper",
    base_diameter: 25.0,
    movement: 3.0 * CIRCLE_DISTANCE,
    action_point_limit: 2,
    defence: 3,
    save: 5,
    wounds: 7,
};

/// Operative archetype
///
/// Defence, save and wounds are descriptive: shooting always neutralizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperativeType {
    KommandoBoy,
    VeteranTrooper,
}

impl OperativeType {
    /// The static profile of this archetype
    pub fn profile(self) -> &'static Profile {
        match self {
            OperativeType::KommandoBoy => &KOMMANDO_BOY,
            OperativeType::VeteranTrooper => &VETERAN_TROOPER,
        }
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }

    pub fn base_radius(self) -> f32 {
        self.profile().base_diameter / 2.0
    }
}

/// What happens to an operative's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTrigger {
    /// The operative performed an action and has this many points left
    ActionTaken { points_left: u8 },
    /// Its side passed while it was mid-activation
    ActivationForfeited,
    /// It was the target of a shot
    Shot,
    /// A new turning point began
    TurningPointReset,
}

/// Activation status of an operative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperativeStatus {
    /// Can be activated this turning point
    Ready,
    /// Currently activating; must keep acting until out of points
    Active,
    /// Done for this turning point
    Activated,
    /// Out of the match for good
    Neutralized,
}

impl OperativeStatus {
    /// Transition table of the activation state machine.
    ///
    /// `Neutralized` is absorbing. Triggers that do not apply to a state leave
    /// it unchanged.
    pub fn next(self, trigger: StatusTrigger) -> OperativeStatus {
        use OperativeStatus::*;

        match (self, trigger) {
            (Neutralized, _) => Neutralized,
            (_, StatusTrigger::Shot) => Neutralized,

            (Ready | Active, StatusTrigger::ActionTaken { points_left: 0 }) => Activated,
            (Ready | Active, StatusTrigger::ActionTaken { .. }) => Active,

            (Active, StatusTrigger::ActivationForfeited) => Activated,

            (Activated | Active | Ready, StatusTrigger::TurningPointReset) => Ready,

            (status, _) => status,
        }
    }

    /// Whether the operative can still act in the current turning point
    pub fn is_pending(self) -> bool {
        matches!(self, OperativeStatus::Ready | OperativeStatus::Active)
    }
}

/// Set of action kinds performed during the current activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const EMPTY: ActionSet = ActionSet(0);

    fn bit(kind: ActionKind) -> u8 {
        match kind {
            ActionKind::Move => 1 << 0,
            ActionKind::Dash => 1 << 1,
            ActionKind::Shoot => 1 << 2,
        }
    }

    pub fn contains(self, kind: ActionKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    pub fn insert(&mut self, kind: ActionKind) {
        self.0 |= Self::bit(kind);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Mutable state of one operative during a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperativeState {
    /// Position in the roster; never reassigned
    pub index: usize,
    pub operative_type: OperativeType,
    pub side: Side,
    pub status: OperativeStatus,
    pub action_points: u8,
    pub performed_actions: ActionSet,
    pub position: Position,
}

impl OperativeState {
    /// A fresh, ready operative with a full set of action points
    pub fn new(index: usize, operative_type: OperativeType, side: Side, position: Position) -> Self {
        Self {
            index,
            operative_type,
            side,
            status: OperativeStatus::Ready,
            action_points: operative_type.profile().action_point_limit,
            performed_actions: ActionSet::EMPTY,
            position,
        }
    }

    pub fn profile(&self) -> &'static Profile {
        self.operative_type.profile()
    }

    pub fn base_radius(&self) -> f32 {
        self.operative_type.base_radius()
    }

    /// The operative's base at its current position
    pub fn base(&self) -> Circle {
        self.base_at(self.position)
    }

    /// The operative's base if it stood at `position`
    pub fn base_at(&self, position: Position) -> Circle {
        Circle::new(position, self.base_radius())
    }

    pub fn is_neutralized(&self) -> bool {
        self.status == OperativeStatus::Neutralized
    }

    pub fn has_performed(&self, kind: ActionKind) -> bool {
        self.performed_actions.contains(kind)
    }

    pub(crate) fn apply_trigger(&mut self, trigger: StatusTrigger) {
        self.status = self.status.next(trigger);
    }

    /// Start a new turning point: ready again with full points and no history
    pub(crate) fn refresh(&mut self) {
        if self.is_neutralized() {
            return;
        }
        self.apply_trigger(StatusTrigger::TurningPointReset);
        self.action_points = self.profile().action_point_limit;
        self.performed_actions.clear();
    }
}

impl fmt::Display for OperativeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}) at {}",
            self.index,
            self.operative_type.name(),
            self.side,
            self.position
        )
    }
}

/// The standard roster: ten Kommando Boys attacking along the top baseline
/// and ten Veteran Troopers defending along the bottom baseline.
///
/// Attackers take indices `0..10`, defenders `10..20`.
pub fn standard_roster() -> Vec<OperativeState> {
    let mut roster = Vec::with_capacity(2 * OPERATIVES_PER_SIDE);

    for i in 0..OPERATIVES_PER_SIDE {
        let position = Position::new(ROSTER_MARGIN + ROSTER_SPACING * i as f32, ROSTER_MARGIN);
        roster.push(OperativeState::new(
            roster.len(),
            OperativeType::KommandoBoy,
            Side::Attacker,
            position,
        ));
    }

    for i in 0..OPERATIVES_PER_SIDE {
        let position = Position::new(
            TOTAL_WIDTH - ROSTER_MARGIN - ROSTER_SPACING * i as f32,
            TOTAL_HEIGHT - ROSTER_MARGIN,
        );
        roster.push(OperativeState::new(
            roster.len(),
            OperativeType::VeteranTrooper,
            Side::Defender,
            position,
        ));
    }

    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::Battlefield;
    use crate::geometry::Intersects;

    #[test]
    fn test_standard_roster_is_dense_and_ready() {
        let roster = standard_roster();
        assert_eq!(roster.len(), 20);

        for (i, operative) in roster.iter().enumerate() {
            assert_eq!(operative.index, i);
            assert_eq!(operative.status, OperativeStatus::Ready);
            assert_eq!(operative.action_points, 2);
            assert!(operative.performed_actions.is_empty());
        }

        assert!(roster[..10].iter().all(|o| o.side == Side::Attacker));
        assert!(roster[10..].iter().all(|o| o.side == Side::Defender));
    }

    #[test]
    fn test_standard_roster_starts_in_drop_zones_without_overlap() {
        let battlefield = Battlefield::standard();
        let roster = standard_roster();

        for operative in &roster {
            let zone = battlefield.drop_zone(operative.side).unwrap();
            assert!(zone.contains(operative.position), "{} outside its drop zone", operative);
            assert!(battlefield.contains_base(operative.position, operative.base_radius()));
            assert_eq!(battlefield.blocking_terrain(&operative.base()), None);
        }

        for a in &roster {
            for b in &roster {
                if a.index != b.index {
                    assert!(!a.base().intersects(&b.base()));
                }
            }
        }
    }

    #[test]
    fn test_status_transitions() {
        use OperativeStatus::*;

        assert_eq!(Ready.next(StatusTrigger::ActionTaken { points_left: 1 }), Active);
        assert_eq!(Active.next(StatusTrigger::ActionTaken { points_left: 0 }), Activated);
        assert_eq!(Ready.next(StatusTrigger::ActionTaken { points_left: 0 }), Activated);
        assert_eq!(Active.next(StatusTrigger::ActivationForfeited), Activated);
        assert_eq!(Ready.next(StatusTrigger::ActivationForfeited), Ready);
        assert_eq!(Activated.next(StatusTrigger::TurningPointReset), Ready);
        assert_eq!(Activated.next(StatusTrigger::Shot), Neutralized);
        assert_eq!(Ready.next(StatusTrigger::Shot), Neutralized);
    }

    #[test]
    fn test_neutralized_is_absorbing() {
        let triggers = [
            StatusTrigger::ActionTaken { points_left: 1 },
            StatusTrigger::ActionTaken { points_left: 0 },
            StatusTrigger::ActivationForfeited,
            StatusTrigger::Shot,
            StatusTrigger::TurningPointReset,
        ];
        for trigger in triggers {
            assert_eq!(OperativeStatus::Neutralized.next(trigger), OperativeStatus::Neutralized);
        }
    }

    #[test]
    fn test_action_set() {
        let mut set = ActionSet::EMPTY;
        assert!(set.is_empty());

        set.insert(ActionKind::Move);
        set.insert(ActionKind::Shoot);
        assert!(set.contains(ActionKind::Move));
        assert!(set.contains(ActionKind::Shoot));
        assert!(!set.contains(ActionKind::Dash));

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_refresh_skips_neutralized() {
        let mut operative =
            OperativeState::new(0, OperativeType::KommandoBoy, Side::Attacker, Position::ZERO);
        operative.status = OperativeStatus::Neutralized;
        operative.action_points = 0;
        operative.refresh();
        assert_eq!(operative.status, OperativeStatus::Neutralized);
        assert_eq!(operative.action_points, 0);
    }
}
