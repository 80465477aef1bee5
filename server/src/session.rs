//! Session table: which transport connection owns which player slot
//!
//! This module is the sole owner of the `connection -> slot` mapping and of
//! every `PlayerState`. It handles:
//! - Slot allocation on connect (lowest free slot first, hard capacity bound)
//! - Slot release on disconnect, with immediate reuse
//! - Attribution of inbound packets to a player via connection lookup
//! - Activity tracking for forced removal of idle sessions
//!
//! Callers only ever hold slot ids, never references into the table, so a
//! reused slot can never be confused with its previous occupant.

use log::info;
use shared::color_for_slot;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Opaque handle the transport assigns to each connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("server full: all {0} player slots are taken")]
    Refused(usize),
    #[error("{0} already owns a player slot")]
    AlreadyConnected(ConnectionId),
    #[error("no walkable tile available to spawn on")]
    NoSpawnPoint,
}

/// Authoritative state of one player slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Stable identity while connected, also seeds the colour
    pub slot_id: u8,
    pub x: i32,
    pub y: i32,
    pub color_index: u8,
    /// Inactive slots have no connection and never appear in broadcasts
    pub active: bool,
}

impl PlayerState {
    fn vacant(slot_id: u8) -> Self {
        Self {
            slot_id,
            x: 0,
            y: 0,
            color_index: color_for_slot(slot_id),
            active: false,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

#[derive(Debug)]
struct Slot {
    player: PlayerState,
    connection: Option<ConnectionId>,
    last_seen: Instant,
}

/// Fixed-capacity arena of player slots indexed by slot id
pub struct SessionTable {
    slots: Vec<Slot>,
    by_connection: HashMap<ConnectionId, u8>,
}

impl SessionTable {
    /// Creates a table with `capacity` slots, all free.
    ///
    /// Capacity is clamped to 256 since slot ids travel as a single byte.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        let now = Instant::now();
        let slots = (0..capacity)
            .map(|id| Slot {
                player: PlayerState::vacant(id as u8),
                connection: None,
                last_seen: now,
            })
            .collect();

        Self {
            slots,
            by_connection: HashMap::new(),
        }
    }

    /// Binds `connection` to the lowest free slot.
    ///
    /// `spawn` picks the starting tile for the slot. Nothing is allocated
    /// when the table is full, the connection is already bound, or no spawn
    /// point exists.
    pub fn connect<F>(&mut self, connection: ConnectionId, spawn: F) -> Result<u8, SessionError>
    where
        F: FnOnce(u8) -> Option<(i32, i32)>,
    {
        if self.by_connection.contains_key(&connection) {
            return Err(SessionError::AlreadyConnected(connection));
        }

        let index = self
            .slots
            .iter()
            .position(|slot| !slot.player.active)
            .ok_or(SessionError::Refused(self.slots.len()))?;
        let slot_id = index as u8;
        let (x, y) = spawn(slot_id).ok_or(SessionError::NoSpawnPoint)?;

        let slot = &mut self.slots[index];
        slot.player = PlayerState {
            slot_id,
            x,
            y,
            color_index: color_for_slot(slot_id),
            active: true,
        };
        slot.connection = Some(connection);
        slot.last_seen = Instant::now();
        self.by_connection.insert(connection, slot_id);

        info!(
            "{} joined as player {} at ({}, {})",
            connection, slot_id, x, y
        );
        Ok(slot_id)
    }

    /// Frees the slot bound to `connection`, returning its id.
    ///
    /// Unknown connections are not an error: the disconnect may belong to
    /// a refused connection or one already removed.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<u8> {
        let slot_id = self.by_connection.remove(&connection)?;
        let slot = &mut self.slots[slot_id as usize];
        slot.player = PlayerState::vacant(slot_id);
        slot.connection = None;

        info!("{} left, player slot {} is free", connection, slot_id);
        Some(slot_id)
    }

    pub fn lookup(&self, connection: ConnectionId) -> Option<u8> {
        self.by_connection.get(&connection).copied()
    }

    /// Active player in `slot_id`, if any
    pub fn player(&self, slot_id: u8) -> Option<&PlayerState> {
        self.slots
            .get(slot_id as usize)
            .map(|slot| &slot.player)
            .filter(|player| player.active)
    }

    pub fn connection_of(&self, slot_id: u8) -> Option<ConnectionId> {
        self.slots.get(slot_id as usize).and_then(|slot| slot.connection)
    }

    /// Active players in slot order
    pub fn active_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.slots
            .iter()
            .map(|slot| &slot.player)
            .filter(|player| player.active)
    }

    /// Connections of all active sessions in slot order
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.slots.iter().filter_map(|slot| slot.connection).collect()
    }

    /// Moves a player. Only the movement path calls this, after validation.
    pub(crate) fn set_position(&mut self, slot_id: u8, x: i32, y: i32) {
        if let Some(slot) = self.slots.get_mut(slot_id as usize) {
            if slot.player.active {
                slot.player.x = x;
                slot.player.y = y;
            }
        }
    }

    /// Records activity on a connection
    pub fn touch(&mut self, connection: ConnectionId) {
        if let Some(&slot_id) = self.by_connection.get(&connection) {
            self.slots[slot_id as usize].last_seen = Instant::now();
        }
    }

    /// Connections that have been silent for longer than `timeout`
    pub fn idle_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        self.slots
            .iter()
            .filter(|slot| slot.last_seen.elapsed() > timeout)
            .filter_map(|slot| slot.connection)
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    #[cfg(test)]
    fn backdate(&mut self, connection: ConnectionId, by: Duration) {
        if let Some(&slot_id) = self.by_connection.get(&connection) {
            self.slots[slot_id as usize].last_seen = Instant::now() - by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_at_origin(_slot: u8) -> Option<(i32, i32)> {
        Some((1, 1))
    }

    #[test]
    fn test_table_creation() {
        let table = SessionTable::new(4);
        assert_eq!(table.capacity(), 4);
        assert!(table.is_empty());
        assert_eq!(table.active_players().count(), 0);
    }

    #[test]
    fn test_capacity_clamped_to_byte_ids() {
        assert_eq!(SessionTable::new(1000).capacity(), 256);
    }

    #[test]
    fn test_connect_allocates_lowest_slot() {
        let mut table = SessionTable::new(4);

        assert_eq!(table.connect(ConnectionId(10), spawn_at_origin), Ok(0));
        assert_eq!(table.connect(ConnectionId(11), spawn_at_origin), Ok(1));
        assert_eq!(table.len(), 2);

        let player = table.player(1).unwrap();
        assert!(player.active);
        assert_eq!(player.slot_id, 1);
        assert_eq!(player.color_index, 1);
        assert_eq!(player.position(), (1, 1));
    }

    #[test]
    fn test_spawn_receives_slot_id() {
        let mut table = SessionTable::new(4);
        table.connect(ConnectionId(1), spawn_at_origin).unwrap();
        let slot = table
            .connect(ConnectionId(2), |slot| Some((slot as i32 * 2, 3)))
            .unwrap();
        assert_eq!(table.player(slot).unwrap().position(), (2, 3));
    }

    #[test]
    fn test_connect_refused_at_capacity() {
        let mut table = SessionTable::new(1);

        assert!(table.connect(ConnectionId(1), spawn_at_origin).is_ok());
        assert_eq!(
            table.connect(ConnectionId(2), spawn_at_origin),
            Err(SessionError::Refused(1))
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(ConnectionId(2)), None);
    }

    #[test]
    fn test_connect_twice_rejected() {
        let mut table = SessionTable::new(4);
        table.connect(ConnectionId(1), spawn_at_origin).unwrap();
        assert_eq!(
            table.connect(ConnectionId(1), spawn_at_origin),
            Err(SessionError::AlreadyConnected(ConnectionId(1)))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_connect_without_spawn_point_leaves_slot_free() {
        let mut table = SessionTable::new(2);
        assert_eq!(
            table.connect(ConnectionId(1), |_| None),
            Err(SessionError::NoSpawnPoint)
        );
        assert!(table.is_empty());
        assert_eq!(table.connect(ConnectionId(2), spawn_at_origin), Ok(0));
    }

    #[test]
    fn test_disconnect_frees_and_clears_slot() {
        let mut table = SessionTable::new(2);
        let slot = table.connect(ConnectionId(7), spawn_at_origin).unwrap();

        assert_eq!(table.disconnect(ConnectionId(7)), Some(slot));
        assert!(table.is_empty());
        assert_eq!(table.player(slot), None);
        assert_eq!(table.lookup(ConnectionId(7)), None);
        assert_eq!(table.connection_of(slot), None);
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let mut table = SessionTable::new(2);
        table.connect(ConnectionId(1), spawn_at_origin).unwrap();

        assert_eq!(table.disconnect(ConnectionId(99)), None);
        assert_eq!(table.len(), 1);

        assert_eq!(table.disconnect(ConnectionId(1)), Some(0));
        assert_eq!(table.disconnect(ConnectionId(1)), None);
    }

    #[test]
    fn test_freed_slot_reused_by_next_connect() {
        let mut table = SessionTable::new(4);
        table.connect(ConnectionId(1), spawn_at_origin).unwrap();
        table.connect(ConnectionId(2), spawn_at_origin).unwrap();
        table.connect(ConnectionId(3), spawn_at_origin).unwrap();

        table.disconnect(ConnectionId(1));
        assert_eq!(table.connect(ConnectionId(4), spawn_at_origin), Ok(0));
        assert_eq!(table.lookup(ConnectionId(4)), Some(0));
        assert_eq!(table.connect(ConnectionId(5), spawn_at_origin), Ok(3));
    }

    #[test]
    fn test_active_slot_ids_unique() {
        let mut table = SessionTable::new(8);
        for id in 0..8 {
            table.connect(ConnectionId(id), spawn_at_origin).unwrap();
        }
        table.disconnect(ConnectionId(2));
        table.disconnect(ConnectionId(5));
        table.connect(ConnectionId(100), spawn_at_origin).unwrap();

        let mut ids: Vec<u8> = table.active_players().map(|p| p.slot_id).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert_eq!(before, 7);
    }

    #[test]
    fn test_active_players_in_slot_order() {
        let mut table = SessionTable::new(4);
        table.connect(ConnectionId(30), spawn_at_origin).unwrap();
        table.connect(ConnectionId(20), spawn_at_origin).unwrap();
        table.connect(ConnectionId(10), spawn_at_origin).unwrap();

        let ids: Vec<u8> = table.active_players().map(|p| p.slot_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(
            table.connections(),
            vec![ConnectionId(30), ConnectionId(20), ConnectionId(10)]
        );
    }

    #[test]
    fn test_set_position_ignores_inactive_slot() {
        let mut table = SessionTable::new(2);
        let slot = table.connect(ConnectionId(1), spawn_at_origin).unwrap();

        table.set_position(slot, 4, 2);
        assert_eq!(table.player(slot).unwrap().position(), (4, 2));

        table.set_position(1, 9, 9);
        assert_eq!(table.player(1), None);
    }

    #[test]
    fn test_idle_connections() {
        let mut table = SessionTable::new(4);
        table.connect(ConnectionId(1), spawn_at_origin).unwrap();
        table.connect(ConnectionId(2), spawn_at_origin).unwrap();

        assert!(table.idle_connections(Duration::from_secs(1)).is_empty());

        table.backdate(ConnectionId(2), Duration::from_secs(10));
        assert_eq!(
            table.idle_connections(Duration::from_secs(5)),
            vec![ConnectionId(2)]
        );

        table.touch(ConnectionId(2));
        assert!(table.idle_connections(Duration::from_secs(5)).is_empty());
    }
}
