use serde::{Deserialize, Serialize};

pub mod codec;
pub mod framing;

pub use codec::ProtocolError;
pub use framing::{encode_frame, FrameBuffer, FrameError, FRAME_HEADER_LEN};

pub const VIEWPORT_WIDTH: i32 = 20;
pub const VIEWPORT_HEIGHT: i32 = 15;
pub const CHUNK_SIZE: i32 = 5;
pub const CHUNK_TILES: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;
pub const MAX_PLAYERS: usize = 32;
pub const PALETTE_SIZE: u8 = 8;
pub const DEFAULT_PORT: u16 = 1234;

/// Largest coordinate that still fits the signed byte used on the wire.
pub const MAX_GRID_DIMENSION: i32 = i8::MAX as i32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    pub id: u8,
    pub walkable: bool,
}

impl Tile {
    /// Filler for chunk cells that fall outside the map.
    pub const VOID: Tile = Tile {
        id: 0,
        walkable: false,
    };

    /// Map files mark walkable ground with the value 1.
    pub fn from_map_value(id: u8) -> Self {
        Self {
            id,
            walkable: id == 1,
        }
    }
}

/// Position of a `CHUNK_SIZE` x `CHUNK_SIZE` block of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn containing(tile_x: i32, tile_y: i32) -> Self {
        Self {
            x: tile_x.div_euclid(CHUNK_SIZE),
            y: tile_y.div_euclid(CHUNK_SIZE),
        }
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.y * CHUNK_SIZE)
    }
}

/// One row of a `PlayerPositions` snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEntry {
    pub id: u8,
    pub x: i8,
    pub y: i8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    TileChunk {
        chunk_x: u8,
        chunk_y: u8,
        tiles: [Tile; CHUNK_TILES],
    },
    Move {
        dir_x: i8,
        dir_y: i8,
    },
    PlayerPositions {
        players: Vec<PlayerEntry>,
    },
    PlayerId {
        player_id: u8,
        color_index: u8,
    },
    AddPlayer {
        player_id: u8,
        color_index: u8,
    },
    RemovePlayer {
        player_id: u8,
    },
}

pub fn color_for_slot(slot_id: u8) -> u8 {
    slot_id % PALETTE_SIZE
}
