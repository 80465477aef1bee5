//! Authoritative world state and the protocol state machine.
//!
//! `GameState` owns the grid and the session table and turns transport
//! events into outbound messages. It never touches the network itself: every
//! handler returns the messages to deliver, in order, and the event loop
//! hands them to the transport. Broadcast recipients are resolved when the
//! message is created, so a player joining later in the same batch never
//! receives traffic from before its own `PlayerId`.

use crate::chunk_streamer::{chunk_packet, initial_window, look_ahead};
use crate::config::ServerConfig;
use crate::grid::Grid;
use crate::movement::validate_move;
use crate::replication::{announce, departure, identity, snapshot, snapshot_of};
use crate::session::{ConnectionId, SessionError, SessionTable};
use log::{debug, info, warn};
use shared::Packet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Send {
        to: ConnectionId,
        packet: Packet,
    },
    Broadcast {
        recipients: Vec<ConnectionId>,
        packet: Packet,
    },
    Close {
        to: ConnectionId,
    },
}

impl Outgoing {
    /// The packet `connection` receives from this message, if any.
    pub fn delivered_to(&self, connection: ConnectionId) -> Option<&Packet> {
        match self {
            Outgoing::Send { to, packet } if *to == connection => Some(packet),
            Outgoing::Broadcast { recipients, packet } if recipients.contains(&connection) => {
                Some(packet)
            }
            _ => None,
        }
    }
}

pub struct GameState {
    grid: Grid,
    sessions: SessionTable,
    correct_rejected_moves: bool,
}

impl GameState {
    pub fn new(grid: Grid, max_players: usize) -> Self {
        Self {
            grid,
            sessions: SessionTable::new(max_players),
            correct_rejected_moves: true,
        }
    }

    pub fn from_config(grid: Grid, config: &ServerConfig) -> Self {
        Self::new(grid, config.max_players).with_corrections(config.correct_rejected_moves)
    }

    pub fn with_corrections(mut self, enabled: bool) -> Self {
        self.correct_rejected_moves = enabled;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    fn broadcast(&self, packet: Packet) -> Outgoing {
        Outgoing::Broadcast {
            recipients: self.sessions.connections(),
            packet,
        }
    }

    /// Admits a new connection or refuses it when the server is full.
    ///
    /// The joiner receives its identity, the announcement of itself, one
    /// `AddPlayer` per player already present, and the whole map. Everyone
    /// then gets a fresh snapshot that includes the new spawn.
    pub fn handle_connect(&mut self, connection: ConnectionId) -> Vec<Outgoing> {
        let grid = &self.grid;
        let slot_id = match self.sessions.connect(connection, |slot| grid.spawn_point(slot)) {
            Ok(slot_id) => slot_id,
            Err(err @ SessionError::AlreadyConnected(_)) => {
                warn!("Ignoring duplicate connect: {}", err);
                return Vec::new();
            }
            Err(err) => {
                warn!("Refusing {}: {}", connection, err);
                return vec![Outgoing::Close { to: connection }];
            }
        };
        let Some(player) = self.sessions.player(slot_id) else {
            return Vec::new();
        };

        let mut outgoing = vec![
            Outgoing::Send {
                to: connection,
                packet: identity(player),
            },
            self.broadcast(announce(player)),
        ];

        outgoing.extend(
            self.sessions
                .active_players()
                .filter(|other| other.slot_id != slot_id)
                .map(|other| Outgoing::Send {
                    to: connection,
                    packet: announce(other),
                }),
        );

        outgoing.extend(
            initial_window(&self.grid)
                .into_iter()
                .map(|coord| Outgoing::Send {
                    to: connection,
                    packet: chunk_packet(&self.grid, coord),
                }),
        );

        outgoing.push(self.broadcast(snapshot(&self.sessions)));
        info!(
            "Player {} ready, {}/{} slots in use",
            slot_id,
            self.sessions.len(),
            self.sessions.capacity()
        );
        outgoing
    }

    /// Handles one received message. Bad input is logged and dropped.
    pub fn handle_packet(&mut self, connection: ConnectionId, bytes: &[u8]) -> Vec<Outgoing> {
        let Some(slot_id) = self.sessions.lookup(connection) else {
            debug!("Dropping message from {} with no session", connection);
            return Vec::new();
        };
        self.sessions.touch(connection);

        match Packet::decode(bytes) {
            Ok(Packet::Move { dir_x, dir_y }) => self.handle_move(slot_id, dir_x, dir_y),
            Ok(other) => {
                warn!(
                    "Player {} sent unexpected {} packet, dropping",
                    slot_id,
                    other.kind()
                );
                Vec::new()
            }
            Err(err) => {
                warn!("Player {} sent a bad packet: {}", slot_id, err);
                Vec::new()
            }
        }
    }

    fn handle_move(&mut self, slot_id: u8, dir_x: i8, dir_y: i8) -> Vec<Outgoing> {
        let (Some(player), Some(connection)) = (
            self.sessions.player(slot_id),
            self.sessions.connection_of(slot_id),
        ) else {
            return Vec::new();
        };

        let outcome = match validate_move(&self.grid, player, dir_x, dir_y) {
            Ok(outcome) => outcome,
            Err(rejection) => {
                warn!("Player {} move rejected: {}", slot_id, rejection);
                if !self.correct_rejected_moves {
                    return Vec::new();
                }
                return vec![Outgoing::Send {
                    to: connection,
                    packet: snapshot_of(player),
                }];
            }
        };

        self.sessions.set_position(slot_id, outcome.to.0, outcome.to.1);
        debug!(
            "Player {} moved ({}, {}) -> ({}, {})",
            slot_id, outcome.from.0, outcome.from.1, outcome.to.0, outcome.to.1
        );

        let mut outgoing = Vec::new();
        if outcome.crossed_chunk() {
            outgoing.extend(
                look_ahead(&self.grid, outcome.from, outcome.to)
                    .into_iter()
                    .map(|coord| Outgoing::Send {
                        to: connection,
                        packet: chunk_packet(&self.grid, coord),
                    }),
            );
        }
        outgoing.push(self.broadcast(snapshot(&self.sessions)));
        outgoing
    }

    /// Releases the session of a closed connection.
    ///
    /// Unknown connections (refused, or already removed) are ignored.
    pub fn handle_disconnect(&mut self, connection: ConnectionId) -> Vec<Outgoing> {
        let Some(slot_id) = self.sessions.disconnect(connection) else {
            debug!("Disconnect from {} with no session", connection);
            return Vec::new();
        };

        vec![
            self.broadcast(departure(slot_id)),
            self.broadcast(snapshot(&self.sessions)),
        ]
    }

    /// Forcibly removes sessions that have been silent longer than `timeout`.
    pub fn expire_idle(&mut self, timeout: Duration) -> Vec<Outgoing> {
        let mut outgoing = Vec::new();
        for connection in self.sessions.idle_connections(timeout) {
            warn!("Removing {} after {:?} of inactivity", connection, timeout);
            outgoing.push(Outgoing::Close { to: connection });
            outgoing.extend(self.handle_disconnect(connection));
        }
        outgoing
    }
}
