//! Decides which map chunks a player needs pushed.
//!
//! A joining player receives the whole map once. After that, chunks are
//! only sent when a move crosses a chunk boundary: the destination chunk plus
//! a look-ahead window biased toward the half of the chunk the player landed
//! in, so the client has the area ahead of it before it gets there.

use crate::grid::Grid;
use log::debug;
use shared::{ChunkCoord, Packet, CHUNK_SIZE};

/// Every chunk of the grid in row-major order.
pub fn initial_window(grid: &Grid) -> Vec<ChunkCoord> {
    let mut chunks = Vec::with_capacity((grid.chunks_x() * grid.chunks_y()) as usize);
    for y in 0..grid.chunks_y() {
        for x in 0..grid.chunks_x() {
            chunks.push(ChunkCoord::new(x, y));
        }
    }
    chunks
}

/// Chunks to push after a move from `from` to `to` (tile coordinates).
///
/// Empty when both positions share a chunk. Otherwise the destination chunk
/// comes first, followed by the horizontal neighbour, the vertical neighbour
/// and the diagonal between them, each only if it lies on the map.
pub fn look_ahead(grid: &Grid, from: (i32, i32), to: (i32, i32)) -> Vec<ChunkCoord> {
    let old_chunk = ChunkCoord::containing(from.0, from.1);
    let new_chunk = ChunkCoord::containing(to.0, to.1);
    if old_chunk == new_chunk {
        return Vec::new();
    }

    let step_x = if to.0.rem_euclid(CHUNK_SIZE) < CHUNK_SIZE / 2 { -1 } else { 1 };
    let step_y = if to.1.rem_euclid(CHUNK_SIZE) < CHUNK_SIZE / 2 { -1 } else { 1 };

    let candidates = [
        new_chunk,
        ChunkCoord::new(new_chunk.x + step_x, new_chunk.y),
        ChunkCoord::new(new_chunk.x, new_chunk.y + step_y),
        ChunkCoord::new(new_chunk.x + step_x, new_chunk.y + step_y),
    ];

    let window: Vec<ChunkCoord> = candidates
        .into_iter()
        .filter(|coord| grid.contains_chunk(*coord))
        .collect();

    debug!(
        "Chunk change ({}, {}) -> ({}, {}), pushing {} chunks",
        old_chunk.x,
        old_chunk.y,
        new_chunk.x,
        new_chunk.y,
        window.len()
    );
    window
}

pub fn chunk_packet(grid: &Grid, coord: ChunkCoord) -> Packet {
    Packet::TileChunk {
        chunk_x: coord.x as u8,
        chunk_y: coord.y as u8,
        tiles: grid.chunk_tiles(coord),
    }
}
