//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::{MatchRoom, RoomError};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use killzone_core::MatchEvent;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Cap on concurrently hosted rooms
    pub max_rooms: usize,
    /// Base seed for hosted matches; entropy when unset
    pub base_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_rooms: 64,
            base_seed: None,
        }
    }
}

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    /// All active rooms
    pub rooms: DashMap<Uuid, MatchRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    matches_started: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            matches_started: AtomicU64::new(0),
        }
    }

    /// Seed for the next hosted match.
    ///
    /// With a base seed, matches get `base, base + 1, ...` in start order.
    pub fn next_seed(&self) -> u64 {
        let count = self.matches_started.fetch_add(1, Ordering::Relaxed);
        match self.config.base_seed {
            Some(base) => base.wrapping_add(count),
            None => rand::random(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Broadcast a message to all players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let players: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.keys().copied().collect(),
            None => return,
        };
        for player_id in players {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Broadcast a message to all players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        let players: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.keys().copied().filter(|id| *id != except).collect(),
            None => return,
        };
        for player_id in players {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Rooms that still count toward the room limit; finished matches do not.
    pub fn open_room_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|r| r.status != RoomStatus::Finished)
            .count()
    }

    /// Get list of waiting rooms.
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }

    fn send_error(&self, player_id: Uuid, message: impl ToString) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.to_string(),
            },
        );
    }

    fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }

    /// Broadcast the current match state, the side to play and, once the
    /// match is over, the record
    fn publish_match(&self, room_id: Uuid, started: bool) {
        let (game, record) = match self.rooms.get(&room_id) {
            Some(room) => match room.state() {
                Some(game) => (game.clone(), room.record()),
                None => return,
            },
            None => return,
        };

        let side = game.current_turn();
        let msg = if started {
            ServerMessage::MatchStarted { state: game }
        } else {
            ServerMessage::MatchState { state: game }
        };
        self.broadcast_to_room(room_id, msg);

        match record {
            Some(record) => self.broadcast_to_room(
                room_id,
                ServerMessage::MatchOver {
                    attacker_score: record.attacker_score,
                    defender_score: record.defender_score,
                    winner: record.winner(),
                    record,
                },
            ),
            None => self.broadcast_to_room(room_id, ServerMessage::TurnChanged { side }),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Killzone server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID
    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = serde_json::to_string(&ServerMessage::Welcome { player_id })?;
    ws_sender.send(Message::Text(welcome)).await?;

    // Forward messages from the channel to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, format!("Invalid message: {}", e));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom { player_name, side } => {
            if state.room_of(player_id).is_some() {
                state.send_error(player_id, "Already in a room");
                return;
            }
            if state.open_room_count() >= state.config.max_rooms {
                state.send_error(player_id, "Server is at its room limit");
                return;
            }

            let room_id = Uuid::new_v4();
            let room = MatchRoom::new(room_id, player_id, player_name, side);
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);
            info!(room = %room_id, %side, "room created");

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
            side,
        } => {
            if state.room_of(player_id).is_some() {
                state.send_error(player_id, "Already in a room");
                return;
            }

            let joined = match state.rooms.get_mut(&room_id) {
                Some(mut room) => match side {
                    Some(side) => room.add_player_on(player_id, player_name, side),
                    None => room.add_player(player_id, player_name).map(|_| ()),
                }
                .map(|()| room.to_info()),
                None => {
                    state.send_error(player_id, "Room not found");
                    return;
                }
            };

            match joined {
                Ok(room_info) => {
                    state.player_rooms.insert(player_id, room_id);
                    state.send_to_player(
                        player_id,
                        ServerMessage::JoinedRoom {
                            room: room_info.clone(),
                        },
                    );
                    state.broadcast_to_room_except(
                        room_id,
                        player_id,
                        ServerMessage::RoomUpdated { room: room_info },
                    );
                }
                Err(e) => state.send_error(player_id, e),
            }
        }

        ClientMessage::LeaveRoom => {
            if let Some((_, room_id)) = state.player_rooms.remove(&player_id) {
                leave_room(player_id, room_id, state);
                state.send_to_player(player_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartMatch { seed } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, RoomError::PlayerNotInRoom);
                return;
            };

            let seed = seed.unwrap_or_else(|| state.next_seed());
            let started = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room.start_match(player_id, seed),
                None => return,
            };

            match started {
                Ok(_) => state.publish_match(room_id, true),
                Err(e) => state.send_error(player_id, e),
            }
        }

        ClientMessage::SubmitAction { action } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, RoomError::PlayerNotInRoom);
                return;
            };

            let result = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room.apply_action(player_id, action),
                None => return,
            };

            match result {
                Ok(events) => {
                    send_action_result(state, player_id, events, None);
                    state.publish_match(room_id, false);
                }
                Err(e) => send_action_result(state, player_id, Vec::new(), Some(e.to_string())),
            }
        }

        ClientMessage::RequestState => {
            let game = state
                .room_of(player_id)
                .and_then(|room_id| state.rooms.get(&room_id)?.state().cloned());

            match game {
                Some(game) => state.send_to_player(player_id, ServerMessage::MatchState { state: game }),
                None => state.send_error(player_id, RoomError::MatchNotStarted),
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

fn send_action_result(
    state: &ServerState,
    player_id: Uuid,
    events: Vec<MatchEvent>,
    error: Option<String>,
) {
    state.send_to_player(
        player_id,
        ServerMessage::ActionResult {
            success: error.is_none(),
            events,
            error,
        },
    );
}

/// Remove a player from a room, deleting the room once no connected player is left.
///
/// A side left during a match is taken over by the default policy.
fn leave_room(player_id: Uuid, room_id: Uuid, state: &ServerState) {
    let outcome = match state.rooms.get_mut(&room_id) {
        Some(mut room) => {
            let is_empty = room.remove_player(player_id).unwrap_or(false);
            let resumed = match (is_empty, room.status) {
                (false, RoomStatus::InMatch) => Some(room.resume()),
                _ => None,
            };
            Some((is_empty, room.to_info(), resumed))
        }
        None => None,
    };

    let Some((is_empty, room_info, resumed)) = outcome else {
        return;
    };

    if is_empty {
        state.rooms.remove(&room_id);
        info!(room = %room_id, "room closed");
        return;
    }

    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    match resumed {
        Some(Ok(_)) => state.publish_match(room_id, false),
        Some(Err(e)) => error!(room = %room_id, "failed to resume match: {}", e),
        None => {}
    }
}

/// Handle player disconnect.
///
/// During a match the seat is kept, marked disconnected, and the default
/// policy takes over the side.
fn handle_disconnect(player_id: Uuid, state: &ServerState) {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        return;
    };

    let outcome = match state.rooms.get_mut(&room_id) {
        Some(mut room) if room.status == RoomStatus::InMatch => {
            room.set_player_connected(player_id, false);
            if room.has_connected_players() {
                let resumed = room.resume();
                Some(Some((room.to_info(), resumed)))
            } else {
                Some(None)
            }
        }
        Some(_) => None,
        None => return,
    };

    match outcome {
        Some(Some((room_info, resumed))) => {
            state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
            match resumed {
                Ok(_) => state.publish_match(room_id, false),
                Err(e) => error!(room = %room_id, "failed to resume match: {}", e),
            }
        }
        Some(None) => {
            state.rooms.remove(&room_id);
            info!(room = %room_id, "room closed");
        }
        None => leave_room(player_id, room_id, state),
    }
}
