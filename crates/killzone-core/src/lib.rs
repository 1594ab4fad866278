//! Killzone - a turn-based skirmish match engine
//!
//! This crate provides the core match logic for two sides of operatives
//! fighting over objectives on a fixed battlefield, including:
//! - A small 2D geometry kernel for bases, terrain and sight lines
//! - The battlefield layout with drop zones, objectives and terrain
//! - Operative profiles and per-unit activation state
//! - The match state machine with full legality checks and scoring
//! - A default random decision provider
//! - Match records with deterministic replay
//!
//! # Architecture
//!
//! The engine is synchronous and does no I/O. All randomness is injected:
//! initiative is rolled once when a match is created and decision providers
//! own their random sources, so an action log replays to the same result.
//!
//! # Modules
//!
//! - [`geometry`]: Points, circles, rectangles, segments and intersection tests
//! - [`battlefield`]: Board constants, sides, drop zones, objectives and terrain
//! - [`operative`]: Operative archetypes, status machine and the standard roster
//! - [`actions`]: Actions, match events and illegal-action reasons
//! - [`game`]: The match state machine
//! - [`policy`]: Decision providers and the default policy
//! - [`record`]: Match records, the match driver and replay

pub mod actions;
pub mod battlefield;
pub mod game;
pub mod geometry;
pub mod operative;
pub mod policy;
pub mod record;

// Re-export commonly used types
pub use actions::{Action, ActionKind, IllegalAction, MatchEvent};
pub use battlefield::{Battlefield, DropZone, Objective, Side, Terrain, TerrainKind};
pub use game::{Initiative, MatchError, MatchState, DASH_DISTANCE, MAX_TURNING_POINTS};
pub use geometry::{Circle, Intersects, Position, Rectangle, Segment};
pub use operative::{
    standard_roster, ActionSet, OperativeState, OperativeStatus, OperativeType, Profile,
};
pub use policy::{DecisionProvider, DefaultPolicy, MAX_MOVE_ATTEMPTS};
pub use record::{play_match, MatchRecord, MatchRecorder, MatchReplay};
