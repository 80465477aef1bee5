//! Client-side mirror of the server's world.
//!
//! The client never decides anything: every field here is a copy of what the
//! server last said. Tiles arrive in chunks, players through the
//! add/remove announcements and the position snapshots.

use log::{debug, warn};
use shared::{color_for_slot, ChunkCoord, Packet, PlayerEntry, Tile, CHUNK_SIZE};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemotePlayer {
    pub id: u8,
    pub color_index: u8,
    /// `None` until the first snapshot mentioning this player
    pub position: Option<(i32, i32)>,
}

pub struct ClientWorld {
    width: i32,
    height: i32,
    tiles: HashMap<(i32, i32), Tile>,
    players: BTreeMap<u8, RemotePlayer>,
    local_id: Option<u8>,
}

impl ClientWorld {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            tiles: HashMap::new(),
            players: BTreeMap::new(),
            local_id: None,
        }
    }

    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::TileChunk {
                chunk_x,
                chunk_y,
                tiles,
            } => {
                let (origin_x, origin_y) =
                    ChunkCoord::new(*chunk_x as i32, *chunk_y as i32).origin();
                for (index, tile) in tiles.iter().enumerate() {
                    let x = origin_x + index as i32 % CHUNK_SIZE;
                    let y = origin_y + index as i32 / CHUNK_SIZE;
                    if x < self.width && y < self.height {
                        self.tiles.insert((x, y), *tile);
                    }
                }
                debug!("Chunk ({}, {}) received", chunk_x, chunk_y);
            }

            Packet::PlayerId {
                player_id,
                color_index,
            } => {
                self.local_id = Some(*player_id);
                self.upsert(*player_id, *color_index);
            }

            Packet::AddPlayer {
                player_id,
                color_index,
            } => self.upsert(*player_id, *color_index),

            Packet::RemovePlayer { player_id } => {
                self.players.remove(player_id);
            }

            Packet::PlayerPositions { players } => {
                for PlayerEntry { id, x, y } in players {
                    self.players
                        .entry(*id)
                        .or_insert_with(|| RemotePlayer {
                            id: *id,
                            color_index: color_for_slot(*id),
                            position: None,
                        })
                        .position = Some((*x as i32, *y as i32));
                }
            }

            Packet::Move { .. } => warn!("Server sent a move packet, ignoring"),
        }
    }

    fn upsert(&mut self, id: u8, color_index: u8) {
        self.players
            .entry(id)
            .and_modify(|player| player.color_index = color_index)
            .or_insert(RemotePlayer {
                id,
                color_index,
                position: None,
            });
    }

    pub fn known_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        self.tiles.get(&(x, y)).copied()
    }

    /// Unknown tiles count as blocked.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).map_or(false, |tile| tile.walkable)
    }

    pub fn players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub fn player(&self, id: u8) -> Option<&RemotePlayer> {
        self.players.get(&id)
    }

    pub fn local_id(&self) -> Option<u8> {
        self.local_id
    }

    pub fn local_player(&self) -> Option<&RemotePlayer> {
        self.local_id.and_then(|id| self.players.get(&id))
    }
}
