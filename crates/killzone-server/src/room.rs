//! Match room management.

use killzone_core::{
    standard_roster, Action, Battlefield, DecisionProvider, DefaultPolicy, MatchError, MatchEvent,
    MatchRecord, MatchRecorder, MatchState, Side,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

/// Upper bound on automatic turns played between two client actions
const MAX_AUTOPLAY_STEPS: usize = 10_000;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("{0} side is already taken")]
    SideTaken(Side),

    #[error("Match already started")]
    MatchAlreadyStarted,

    #[error("Match not started")]
    MatchNotStarted,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// A player seated in a room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub side: Side,
    pub connected: bool,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String, side: Side) -> Self {
        Self {
            id,
            name,
            side,
            connected: true,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            side: self.side,
            connected: self.connected,
        }
    }
}

/// A room hosting one match. Each side is played by at most one client;
/// sides without a client are played by the default policy.
pub struct MatchRoom {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Join order, used to pick a new host
    pub player_order: Vec<Uuid>,
    /// The match and its log (once started)
    pub recorder: Option<MatchRecorder>,
    policy: Option<DefaultPolicy>,
}

impl MatchRoom {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String, side: Side) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone(), side));

        Self {
            id,
            name: format!("{}'s Match", host_name),
            host_id,
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            recorder: None,
            policy: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        Side::ALL.iter().all(|&side| self.is_seated(side))
    }

    /// Whether a client holds the seat for `side`, connected or not
    pub fn is_seated(&self, side: Side) -> bool {
        self.players.values().any(|p| p.side == side)
    }

    /// Whether a connected client plays `side`; otherwise the default policy does
    pub fn is_client_controlled(&self, side: Side) -> bool {
        self.players.values().any(|p| p.side == side && p.connected)
    }

    pub fn has_connected_players(&self) -> bool {
        self.players.values().any(|p| p.connected)
    }

    pub fn seat_of(&self, player_id: Uuid) -> Option<Side> {
        self.players.get(&player_id).map(|p| p.side)
    }

    /// Seat a player on the free side
    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<Side, RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::MatchAlreadyStarted);
        }

        let side = Side::ALL
            .into_iter()
            .find(|&side| !self.is_seated(side))
            .ok_or(RoomError::RoomFull)?;

        self.players
            .insert(player_id, RoomPlayer::new(player_id, name, side));
        self.player_order.push(player_id);
        Ok(side)
    }

    /// Seat a player on a specific side
    pub fn add_player_on(&mut self, player_id: Uuid, name: String, side: Side) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::MatchAlreadyStarted);
        }
        if self.is_seated(side) {
            return Err(RoomError::SideTaken(side));
        }

        self.players
            .insert(player_id, RoomPlayer::new(player_id, name, side));
        self.player_order.push(player_id);
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        self.players.remove(&player_id);
        self.player_order.retain(|&id| id != player_id);

        // If host left, assign new host
        if player_id == self.host_id {
            if let Some(&next) = self.player_order.first() {
                self.host_id = next;
            }
        }

        // Return true if no connected player is left
        Ok(!self.has_connected_players())
    }

    pub fn set_player_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = connected;
        }
    }

    /// Start the standard match. Initiative and automatic play are seeded
    /// from `seed`, so a room started with the same seed and the same client
    /// actions plays out identically.
    pub fn start_match(&mut self, requester_id: Uuid, seed: u64) -> Result<Vec<MatchEvent>, RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::MatchAlreadyStarted);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let state = MatchState::with_rolled_initiative(
            Arc::new(Battlefield::standard()),
            standard_roster(),
            &mut rng,
        )?;

        info!(room = %self.id, seed, initiative = ?state.initiative(), "match started");

        self.recorder = Some(MatchRecorder::new(state));
        self.policy = Some(DefaultPolicy::with_seed(seed.wrapping_add(1)));
        self.status = RoomStatus::InMatch;

        self.resume()
    }

    /// Apply an action submitted by a seated player, then play automatic
    /// turns until a seated side must act
    pub fn apply_action(
        &mut self,
        player_id: Uuid,
        action: serde_json::Value,
    ) -> Result<Vec<MatchEvent>, RoomError> {
        let side = self.seat_of(player_id).ok_or(RoomError::PlayerNotInRoom)?;
        let recorder = self.recorder.as_mut().ok_or(RoomError::MatchNotStarted)?;

        if recorder.state().current_turn() != side {
            return Err(RoomError::NotYourTurn);
        }

        // Parse and apply action
        let action: Option<Action> = serde_json::from_value(action)
            .map_err(|e| RoomError::InvalidAction(e.to_string()))?;

        let mut events = recorder.apply(action)?;
        events.extend(self.resume()?);

        Ok(events)
    }

    /// Play sides without a connected client with the default policy and
    /// pass for client sides that have nobody left to activate
    pub fn resume(&mut self) -> Result<Vec<MatchEvent>, RoomError> {
        let mut events = Vec::new();
        let seated: Vec<Side> = Side::ALL
            .into_iter()
            .filter(|&side| self.is_client_controlled(side))
            .collect();

        let (Some(recorder), Some(policy)) = (self.recorder.as_mut(), self.policy.as_mut()) else {
            return Err(RoomError::MatchNotStarted);
        };

        for _ in 0..MAX_AUTOPLAY_STEPS {
            let state = recorder.state();
            if state.is_finished() {
                break;
            }

            let side = state.current_turn();
            let action = if seated.contains(&side) {
                if !state.selectable_operatives().is_empty() {
                    return Ok(self.finish_if_over(events));
                }
                None
            } else {
                policy.decide(state)
            };

            debug!(room = %self.id, %side, ?action, "automatic turn");
            events.extend(recorder.apply(action)?);
        }

        if !recorder.state().is_finished() {
            return Err(MatchError::StepLimitExceeded(MAX_AUTOPLAY_STEPS).into());
        }

        Ok(self.finish_if_over(events))
    }

    fn finish_if_over(&mut self, events: Vec<MatchEvent>) -> Vec<MatchEvent> {
        if self.status == RoomStatus::InMatch && self.is_finished() {
            self.status = RoomStatus::Finished;
            if let Some(state) = self.state() {
                info!(
                    room = %self.id,
                    attacker_score = state.attacker_score(),
                    defender_score = state.defender_score(),
                    "match over"
                );
            }
        }
        events
    }

    pub fn state(&self) -> Option<&MatchState> {
        self.recorder.as_ref().map(|r| r.state())
    }

    pub fn current_turn(&self) -> Option<Side> {
        self.state().map(|s| s.current_turn())
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_some_and(|s| s.is_finished())
    }

    /// The match record, once the match is over
    pub fn record(&self) -> Option<MatchRecord> {
        self.recorder
            .as_ref()
            .filter(|r| r.state().is_finished())
            .map(|r| r.record())
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| self.players.get(id).map(|p| p.to_info()))
                .collect(),
            host_id: self.host_id,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use killzone_core::{IllegalAction, Position};
    use serde_json::json;

    fn solo_room(side: Side) -> (MatchRoom, Uuid) {
        let host_id = Uuid::new_v4();
        let room = MatchRoom::new(Uuid::new_v4(), host_id, "Host".to_string(), side);
        (room, host_id)
    }

    #[test]
    fn test_create_room() {
        let (room, host_id) = solo_room(Side::Attacker);

        assert_eq!(room.player_count(), 1);
        assert!(!room.is_full());
        assert_eq!(room.host_id, host_id);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.seat_of(host_id), Some(Side::Attacker));
    }

    #[test]
    fn test_add_remove_players() {
        let (mut room, host_id) = solo_room(Side::Defender);

        let player2 = Uuid::new_v4();
        assert_eq!(room.add_player(player2, "Player 2".to_string()).unwrap(), Side::Attacker);
        assert_eq!(room.player_count(), 2);
        assert!(room.is_full());

        // Can't add more players
        let player3 = Uuid::new_v4();
        assert!(matches!(
            room.add_player(player3, "Player 3".to_string()),
            Err(RoomError::RoomFull)
        ));

        // Host leaves, the other player takes over
        let empty = room.remove_player(host_id).unwrap();
        assert!(!empty);
        assert_eq!(room.host_id, player2);
        assert!(room.remove_player(player2).unwrap());
    }

    #[test]
    fn test_side_taken() {
        let (mut room, _) = solo_room(Side::Attacker);
        assert!(matches!(
            room.add_player_on(Uuid::new_v4(), "Late".to_string(), Side::Attacker),
            Err(RoomError::SideTaken(Side::Attacker))
        ));
        room.add_player_on(Uuid::new_v4(), "Late".to_string(), Side::Defender)
            .unwrap();
        assert!(room.is_full());
    }

    #[test]
    fn test_start_match() {
        let (mut room, host_id) = solo_room(Side::Attacker);

        // Non-host can't start
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        assert!(matches!(room.start_match(player2, 1), Err(RoomError::NotHost)));

        room.start_match(host_id, 1).unwrap();
        assert_eq!(room.status, RoomStatus::InMatch);
        assert!(room.state().is_some());
        assert!(matches!(room.start_match(host_id, 1), Err(RoomError::MatchAlreadyStarted)));
    }

    #[test]
    fn test_solo_room_waits_for_seated_side() {
        let (mut room, _) = solo_room(Side::Defender);

        let events = room.start_match(room.host_id, 99).unwrap();
        let state = room.state().unwrap();

        assert_eq!(state.current_turn(), Side::Defender);
        assert!(!state.selectable_operatives().is_empty());
        // The default policy played the attacker if it had initiative
        if state.initiative()[0] == Side::Attacker {
            assert!(!events.is_empty());
        }
    }

    #[test]
    fn test_wrong_side_and_bad_actions() {
        let (mut room, host_id) = solo_room(Side::Attacker);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        room.start_match(host_id, 7).unwrap();

        let (to_play, waiting) = match room.current_turn().unwrap() {
            Side::Attacker => (host_id, player2),
            Side::Defender => (player2, host_id),
        };

        assert!(matches!(
            room.apply_action(waiting, serde_json::Value::Null),
            Err(RoomError::NotYourTurn)
        ));
        assert!(matches!(
            room.apply_action(to_play, json!({"Teleport": {}})),
            Err(RoomError::InvalidAction(_))
        ));

        let operative = room.state().unwrap().selectable_operatives()[0];
        let off_board = json!({"Move": {"operative": operative, "destination": {"x": -100.0, "y": -100.0}}});
        assert!(matches!(
            room.apply_action(to_play, off_board),
            Err(RoomError::Match(MatchError::IllegalAction {
                reason: IllegalAction::OutOfBounds,
                ..
            }))
        ));

        assert!(matches!(
            room.apply_action(Uuid::new_v4(), serde_json::Value::Null),
            Err(RoomError::PlayerNotInRoom)
        ));
    }

    #[test]
    fn test_client_can_play_a_match_to_the_end() {
        let (mut room, host_id) = solo_room(Side::Attacker);
        room.start_match(host_id, 2024).unwrap();
        let mut brain = DefaultPolicy::with_seed(5);

        while !room.is_finished() {
            let action = brain.decide(room.state().unwrap());
            room.apply_action(host_id, serde_json::to_value(action).unwrap())
                .unwrap();
        }

        assert_eq!(room.status, RoomStatus::Finished);
        let record = room.record().unwrap();
        let replayed = record.replay().unwrap();
        let state = room.state().unwrap();
        assert_eq!(replayed.attacker_score(), state.attacker_score());
        assert_eq!(replayed.defender_score(), state.defender_score());
    }

    #[test]
    fn test_disconnected_side_is_played_automatically() {
        let (mut room, host_id) = solo_room(Side::Attacker);
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();
        room.start_match(host_id, 11).unwrap();

        room.set_player_connected(player2, false);
        assert!(room.is_seated(Side::Defender));
        assert!(!room.is_client_controlled(Side::Defender));
        room.resume().unwrap();

        assert!(room.is_finished() || room.current_turn() == Some(Side::Attacker));
        assert!(room.has_connected_players());

        room.set_player_connected(host_id, false);
        assert!(!room.has_connected_players());
    }

    #[test]
    fn test_stay_in_place_move_is_accepted() {
        let (mut room, host_id) = solo_room(Side::Attacker);
        room.start_match(host_id, 3).unwrap();

        let state = room.state().unwrap();
        let operative = state.selectable_operatives()[0];
        let position: Position = state.operative(operative).unwrap().position;
        let action = json!({"Move": {"operative": operative, "destination": {"x": position.x, "y": position.y}}});

        let events = room.apply_action(host_id, action).unwrap();
        assert!(matches!(events[0], MatchEvent::OperativeMoved { .. }));
    }
}
