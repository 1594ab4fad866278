//! Battlefield layout: bounds, drop zones, objectives and terrain.
//!
//! This module contains:
//! - Sides and their drop zones
//! - The named tactical distances every range in the game derives from
//! - Objective markers
//! - Terrain pieces and their blocking semantics
//! - The standard fixed layout
//!
//! A `Battlefield` is built once and never mutated afterwards. Match states
//! share it through an `Arc`.

use crate::geometry::{Circle, Intersects, Position, Rectangle, Segment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Board width in grid units (inches)
pub const GRID_WIDTH: u32 = 30;
/// Board height in grid units (inches)
pub const GRID_HEIGHT: u32 = 22;
/// Size of one grid unit in millimetres
pub const GRID_STEP: f32 = 25.4;

pub const TOTAL_WIDTH: f32 = GRID_WIDTH as f32 * GRID_STEP;
pub const TOTAL_HEIGHT: f32 = GRID_HEIGHT as f32 * GRID_STEP;
pub const CENTER_X: f32 = TOTAL_WIDTH / 2.0;
pub const CENTER_Y: f32 = TOTAL_HEIGHT / 2.0;

/// Triangle distance: 1 grid unit
pub const TRIANGLE_DISTANCE: f32 = GRID_STEP;
/// Circle distance: 2 grid units
pub const CIRCLE_DISTANCE: f32 = 2.0 * GRID_STEP;
/// Square distance: 3 grid units
pub const SQUARE_DISTANCE: f32 = 3.0 * GRID_STEP;
/// Pentagon distance: 6 grid units
pub const PENTAGON_DISTANCE: f32 = 6.0 * GRID_STEP;

/// Control radius shared by every objective marker
pub const OBJECTIVE_RADIUS: f32 = CIRCLE_DISTANCE;

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    /// Both sides, attacker first
    pub const ALL: [Side; 2] = [Side::Attacker, Side::Defender];

    /// The side playing against this one
    pub fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Attacker => write!(f, "Attacker"),
            Side::Defender => write!(f, "Defender"),
        }
    }
}

/// A deployment strip owned by one side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropZone {
    /// Top-left corner of the zone
    pub position: Position,
    pub width: f32,
    pub height: f32,
    pub side: Side,
}

impl DropZone {
    pub fn new(position: Position, width: f32, height: f32, side: Side) -> Self {
        Self {
            position,
            width,
            height,
            side,
        }
    }

    /// The zone as a center-based rectangle
    pub fn area(&self) -> Rectangle {
        Rectangle::new(
            Position::new(
                self.position.x + self.width / 2.0,
                self.position.y + self.height / 2.0,
            ),
            self.width,
            self.height,
        )
    }

    pub fn contains(&self, point: Position) -> bool {
        self.area().contains(point)
    }
}

/// An objective marker contested by proximity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub position: Position,
}

impl Objective {
    pub const RADIUS: f32 = OBJECTIVE_RADIUS;

    pub fn new(position: Position) -> Self {
        Self { position }
    }

    /// Whether a base of the given radius centered at `center` controls this marker
    pub fn is_within_control_range(&self, center: Position, base_radius: f32) -> bool {
        self.position.distance_to(center) <= Self::RADIUS + base_radius
    }
}

/// Terrain type flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TerrainKind(u8);

impl TerrainKind {
    pub const INSIGNIFICANT: TerrainKind = TerrainKind(0);
    pub const LIGHT: TerrainKind = TerrainKind(1 << 0);
    pub const HEAVY: TerrainKind = TerrainKind(1 << 1);
    pub const TRAVERSABLE: TerrainKind = TerrainKind(1 << 2);
    pub const VANTAGE_POINT: TerrainKind = TerrainKind(1 << 3);
    pub const BARRICADE: TerrainKind = TerrainKind(Self::LIGHT.0 | Self::TRAVERSABLE.0);

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: TerrainKind) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_heavy(self) -> bool {
        self.contains(Self::HEAVY)
    }

    pub const fn is_traversable(self) -> bool {
        self.contains(Self::TRAVERSABLE)
    }
}

impl BitOr for TerrainKind {
    type Output = TerrainKind;

    fn bitor(self, rhs: TerrainKind) -> TerrainKind {
        TerrainKind(self.0 | rhs.0)
    }
}

/// A terrain piece
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub kind: TerrainKind,
    /// Center of the footprint
    pub position: Position,
    /// Rotation in degrees; footprints are treated as axis-aligned
    pub rotation: f32,
    pub width: f32,
    pub height: f32,
}

impl Terrain {
    pub fn new(kind: TerrainKind, position: Position, width: f32, height: f32) -> Self {
        Self {
            kind,
            position,
            rotation: 0.0,
            width,
            height,
        }
    }

    /// Axis-aligned footprint used for collision and visibility
    pub fn footprint(&self) -> Rectangle {
        Rectangle::new(self.position, self.width, self.height)
    }

    /// Whether an operative base may not overlap this piece
    pub fn blocks_movement(&self) -> bool {
        !self.kind.is_traversable()
    }

    /// Every piece obstructs visibility, heavy or not
    pub fn blocks_line_of_sight(&self) -> bool {
        true
    }
}

/// The fixed battlefield a match is played on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battlefield {
    pub width: f32,
    pub height: f32,
    pub drop_zones: Vec<DropZone>,
    pub objectives: Vec<Objective>,
    pub terrains: Vec<Terrain>,
}

impl Battlefield {
    /// An open battlefield of the standard size with no zones, objectives or terrain
    pub fn empty() -> Self {
        Self {
            width: TOTAL_WIDTH,
            height: TOTAL_HEIGHT,
            drop_zones: Vec::new(),
            objectives: Vec::new(),
            terrains: Vec::new(),
        }
    }

    /// The standard layout: two drop zones, six objectives and nine terrain pieces
    pub fn standard() -> Self {
        let drop_zones = vec![
            DropZone::new(Position::ZERO, TOTAL_WIDTH, SQUARE_DISTANCE, Side::Attacker),
            DropZone::new(
                Position::new(0.0, TOTAL_HEIGHT - SQUARE_DISTANCE),
                TOTAL_WIDTH,
                SQUARE_DISTANCE,
                Side::Defender,
            ),
        ];

        let objectives = vec![
            Objective::new(Position::new(CENTER_X + PENTAGON_DISTANCE, CENTER_Y + CIRCLE_DISTANCE)),
            Objective::new(Position::new(CENTER_X - PENTAGON_DISTANCE, CENTER_Y - CIRCLE_DISTANCE)),
            Objective::new(Position::new(CENTER_X, PENTAGON_DISTANCE)),
            Objective::new(Position::new(CENTER_X, TOTAL_HEIGHT - PENTAGON_DISTANCE)),
            Objective::new(Position::new(SQUARE_DISTANCE, CENTER_Y + CIRCLE_DISTANCE)),
            Objective::new(Position::new(TOTAL_WIDTH - SQUARE_DISTANCE, CENTER_Y - CIRCLE_DISTANCE)),
        ];

        let heavy = TerrainKind::HEAVY;
        let barricade = TerrainKind::LIGHT | TerrainKind::TRAVERSABLE;

        let terrains = vec![
            Terrain::new(
                heavy,
                Position::new(CENTER_X, CENTER_Y),
                3.0 * CIRCLE_DISTANCE,
                2.0 * CIRCLE_DISTANCE,
            ),
            Terrain::new(
                heavy,
                Position::new(SQUARE_DISTANCE + TRIANGLE_DISTANCE, PENTAGON_DISTANCE),
                2.0 * CIRCLE_DISTANCE,
                2.0 * CIRCLE_DISTANCE,
            ),
            Terrain::new(
                heavy,
                Position::new(
                    TOTAL_WIDTH - TRIANGLE_DISTANCE - SQUARE_DISTANCE,
                    TOTAL_HEIGHT - PENTAGON_DISTANCE,
                ),
                2.0 * CIRCLE_DISTANCE,
                2.0 * CIRCLE_DISTANCE,
            ),
            Terrain::new(
                heavy,
                Position::new(
                    TOTAL_WIDTH - TRIANGLE_DISTANCE - SQUARE_DISTANCE,
                    PENTAGON_DISTANCE - TRIANGLE_DISTANCE,
                ),
                2.0 * CIRCLE_DISTANCE,
                CIRCLE_DISTANCE,
            ),
            Terrain::new(
                heavy,
                Position::new(
                    SQUARE_DISTANCE + TRIANGLE_DISTANCE,
                    TOTAL_HEIGHT - PENTAGON_DISTANCE + TRIANGLE_DISTANCE,
                ),
                2.0 * CIRCLE_DISTANCE,
                CIRCLE_DISTANCE,
            ),
            Terrain::new(
                barricade,
                Position::new(CENTER_X + PENTAGON_DISTANCE, CENTER_Y - 4.5 * GRID_STEP),
                TRIANGLE_DISTANCE,
                PENTAGON_DISTANCE,
            ),
            Terrain::new(
                barricade,
                Position::new(CENTER_X - PENTAGON_DISTANCE, CENTER_Y + 4.5 * GRID_STEP),
                TRIANGLE_DISTANCE,
                PENTAGON_DISTANCE,
            ),
            Terrain::new(
                barricade,
                Position::new(CENTER_X - 5.0 * GRID_STEP, CENTER_Y - 5.0 * GRID_STEP),
                4.0 * GRID_STEP,
                TRIANGLE_DISTANCE,
            ),
            Terrain::new(
                barricade,
                Position::new(CENTER_X + 5.0 * GRID_STEP, CENTER_Y + 5.0 * GRID_STEP),
                4.0 * GRID_STEP,
                TRIANGLE_DISTANCE,
            ),
        ];

        Self {
            width: TOTAL_WIDTH,
            height: TOTAL_HEIGHT,
            drop_zones,
            objectives,
            terrains,
        }
    }

    /// The drop zone owned by a side
    pub fn drop_zone(&self, side: Side) -> Option<&DropZone> {
        self.drop_zones.iter().find(|zone| zone.side == side)
    }

    /// Whether a base of `radius` centered at `center` lies fully on the board
    pub fn contains_base(&self, center: Position, radius: f32) -> bool {
        center.x + radius < self.width
            && center.y + radius < self.height
            && center.x - radius >= 0.0
            && center.y - radius >= 0.0
    }

    /// Index of the first movement-blocking terrain piece overlapped by `base`
    pub fn blocking_terrain(&self, base: &Circle) -> Option<usize> {
        self.terrains
            .iter()
            .position(|terrain| terrain.blocks_movement() && base.intersects(&terrain.footprint()))
    }

    /// Whether the straight line between two points is unobstructed by terrain
    pub fn has_line_of_sight(&self, from: Position, to: Position) -> bool {
        let sight = Segment::new(from, to);
        !self
            .terrains
            .iter()
            .any(|terrain| terrain.blocks_line_of_sight() && sight.intersects(&terrain.footprint()))
    }
}

impl Default for Battlefield {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_dimensions() {
        let battlefield = Battlefield::standard();
        assert!((battlefield.width - 762.0).abs() < 0.01);
        assert!((battlefield.height - 558.8).abs() < 0.01);
    }

    #[test]
    fn test_standard_layout_counts() {
        let battlefield = Battlefield::standard();
        assert_eq!(battlefield.drop_zones.len(), 2);
        assert_eq!(battlefield.objectives.len(), 6);
        assert_eq!(battlefield.terrains.len(), 9);

        let heavy = battlefield.terrains.iter().filter(|t| t.kind.is_heavy()).count();
        assert_eq!(heavy, 5);
    }

    #[test]
    fn test_drop_zones_are_strips() {
        let battlefield = Battlefield::standard();

        let attacker = battlefield.drop_zone(Side::Attacker).unwrap();
        assert!(attacker.contains(Position::new(30.0, 30.0)));
        assert!(!attacker.contains(Position::new(30.0, 100.0)));

        let defender = battlefield.drop_zone(Side::Defender).unwrap();
        assert!(defender.contains(Position::new(TOTAL_WIDTH - 30.0, TOTAL_HEIGHT - 30.0)));
    }

    #[test]
    fn test_objectives_within_bounds() {
        let battlefield = Battlefield::standard();
        for objective in &battlefield.objectives {
            assert!(battlefield.contains_base(objective.position, 0.0));
        }
    }

    #[test]
    fn test_objectives_are_point_symmetric() {
        let battlefield = Battlefield::standard();
        for objective in &battlefield.objectives {
            let mirrored = Position::new(
                TOTAL_WIDTH - objective.position.x,
                TOTAL_HEIGHT - objective.position.y,
            );
            assert!(battlefield
                .objectives
                .iter()
                .any(|o| o.position.distance_to(mirrored) < 0.01));
        }
    }

    #[test]
    fn test_terrain_kind_flags() {
        let barricade = TerrainKind::LIGHT | TerrainKind::TRAVERSABLE;
        assert_eq!(barricade, TerrainKind::BARRICADE);
        assert!(barricade.is_traversable());
        assert!(!barricade.is_heavy());
        assert!(TerrainKind::HEAVY.is_heavy());
        assert!(!TerrainKind::INSIGNIFICANT.contains(TerrainKind::LIGHT));
    }

    #[test]
    fn test_contains_base() {
        let battlefield = Battlefield::empty();
        assert!(battlefield.contains_base(Position::new(16.0, 16.0), 16.0));
        assert!(!battlefield.contains_base(Position::new(15.9, 100.0), 16.0));
        assert!(!battlefield.contains_base(Position::new(TOTAL_WIDTH - 16.0, 100.0), 16.0));
    }

    #[test]
    fn test_traversable_terrain_does_not_block_movement() {
        let battlefield = Battlefield::standard();
        let barricade = battlefield
            .terrains
            .iter()
            .position(|t| t.kind.is_traversable())
            .unwrap();
        let base = Circle::new(battlefield.terrains[barricade].position, 16.0);
        assert_eq!(battlefield.blocking_terrain(&base), None);

        let center = Circle::new(Position::new(CENTER_X, CENTER_Y), 16.0);
        assert_eq!(battlefield.blocking_terrain(&center), Some(0));
    }

    #[test]
    fn test_line_of_sight_blocked_by_central_terrain() {
        let battlefield = Battlefield::standard();
        let west = Position::new(CENTER_X - 200.0, CENTER_Y);
        let east = Position::new(CENTER_X + 200.0, CENTER_Y);
        assert!(!battlefield.has_line_of_sight(west, east));

        let empty = Battlefield::empty();
        assert!(empty.has_line_of_sight(west, east));
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Attacker.opponent(), Side::Defender);
        assert_eq!(Side::Defender.opponent(), Side::Attacker);
    }
}
