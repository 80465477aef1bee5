//! Authoritative move validation.
//!
//! Validation is a pure function of the grid and the mover's current
//! position. Nothing is mutated here; the caller applies an accepted outcome,
//! so a rejected move can never leave a player half-moved.

use crate::grid::Grid;
use crate::session::PlayerState;
use shared::ChunkCoord;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("step ({dir_x}, {dir_y}) is not a unit step")]
    InvalidStep { dir_x: i8, dir_y: i8 },
    #[error("target ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
    #[error("target ({x}, {y}) is not walkable (tile_id={tile_id})")]
    NotWalkable { x: i32, y: i32, tile_id: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

impl MoveOutcome {
    pub fn from_chunk(&self) -> ChunkCoord {
        ChunkCoord::containing(self.from.0, self.from.1)
    }

    pub fn to_chunk(&self) -> ChunkCoord {
        ChunkCoord::containing(self.to.0, self.to.1)
    }

    pub fn crossed_chunk(&self) -> bool {
        self.from_chunk() != self.to_chunk()
    }
}

pub fn validate_move(
    grid: &Grid,
    player: &PlayerState,
    dir_x: i8,
    dir_y: i8,
) -> Result<MoveOutcome, MoveRejection> {
    if !(-1..=1).contains(&dir_x) || !(-1..=1).contains(&dir_y) {
        return Err(MoveRejection::InvalidStep { dir_x, dir_y });
    }

    let x = player.x + dir_x as i32;
    let y = player.y + dir_y as i32;

    let tile = grid
        .tile(x, y)
        .ok_or(MoveRejection::OutOfBounds { x, y })?;
    if !tile.walkable {
        return Err(MoveRejection::NotWalkable {
            x,
            y,
            tile_id: tile.id,
        });
    }

    Ok(MoveOutcome {
        from: (player.x, player.y),
        to: (x, y),
    })
}
