//! Static world data: tile ids and walkability, loaded once at startup.

use log::{info, warn};
use shared::{ChunkCoord, Tile, CHUNK_SIZE, CHUNK_TILES, MAX_GRID_DIMENSION};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Preferred spawn tiles, picked by `slot_id % 8`.
const SPAWN_POINTS: [(i32, i32); 8] = [
    (5, 5),
    (5, 8),
    (5, 10),
    (15, 10),
    (7, 7),
    (13, 7),
    (7, 13),
    (13, 13),
];

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tile {token:?} at row {row}, column {column}")]
    InvalidTile {
        row: usize,
        column: usize,
        token: String,
    },
    #[error("map size {width}x{height} must be between 1x1 and {max}x{max}", max = MAX_GRID_DIMENSION)]
    InvalidDimensions { width: i32, height: i32 },
    #[error("map has no walkable tile to spawn players on")]
    NoWalkableTiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    /// Row-major, `y * width + x`
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn new(width: i32, height: i32, tiles: Vec<Tile>) -> Result<Self, MapError> {
        check_dimensions(width, height)?;
        if tiles.len() != (width * height) as usize {
            return Err(MapError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    /// Map used when loading fails and the fallback was explicitly enabled.
    pub fn all_walkable(width: i32, height: i32) -> Result<Self, MapError> {
        check_dimensions(width, height)?;
        Self::new(
            width,
            height,
            vec![Tile::from_map_value(1); (width * height) as usize],
        )
    }

    /// Parses whitespace-separated tile values, one map row per line.
    ///
    /// Rows and columns missing from the text stay `Tile::VOID`, including
    /// blank lines inside the map. Trailing blank lines and anything beyond
    /// `width` x `height` are ignored.
    pub fn parse(text: &str, width: i32, height: i32) -> Result<Self, MapError> {
        check_dimensions(width, height)?;
        let mut tiles = vec![Tile::VOID; (width * height) as usize];
        let mut truncated = false;
        let mut rows = 0;

        let mut lines: Vec<&str> = text.lines().collect();
        while lines.last().map_or(false, |line| line.trim().is_empty()) {
            lines.pop();
        }

        for (row, line) in lines.into_iter().enumerate() {
            if row >= height as usize {
                truncated = true;
                break;
            }
            rows += 1;

            for (column, token) in line.split_whitespace().enumerate() {
                if column >= width as usize {
                    truncated = true;
                    break;
                }
                let value: u8 = token.parse().map_err(|_| MapError::InvalidTile {
                    row,
                    column,
                    token: token.to_string(),
                })?;
                tiles[row * width as usize + column] = Tile::from_map_value(value);
            }
        }

        if truncated {
            warn!("Map data exceeds {}x{}, extra tiles ignored", width, height);
        }
        if rows < height as usize {
            warn!(
                "Map has {} rows, expected {}; missing tiles are not walkable",
                rows, height
            );
        }

        let grid = Self::new(width, height, tiles)?;
        if grid.walkable_count() == 0 {
            return Err(MapError::NoWalkableTiles);
        }
        Ok(grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&y)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.tiles[(y * self.width + x) as usize])
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_some_and(|tile| tile.walkable)
    }

    pub fn walkable_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.walkable).count()
    }

    pub fn chunks_x(&self) -> i32 {
        (self.width + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    pub fn chunks_y(&self) -> i32 {
        (self.height + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        (0..self.chunks_x()).contains(&coord.x) && (0..self.chunks_y()).contains(&coord.y)
    }

    /// Tiles of one chunk in row-major order, padded with `Tile::VOID` where
    /// the chunk hangs over the map edge.
    pub fn chunk_tiles(&self, coord: ChunkCoord) -> [Tile; CHUNK_TILES] {
        let mut tiles = [Tile::VOID; CHUNK_TILES];
        let (start_x, start_y) = coord.origin();

        for dy in 0..CHUNK_SIZE {
            for dx in 0..CHUNK_SIZE {
                if let Some(tile) = self.tile(start_x + dx, start_y + dy) {
                    tiles[(dy * CHUNK_SIZE + dx) as usize] = tile;
                }
            }
        }
        tiles
    }

    /// Start position for a newly joined player.
    ///
    /// Falls back to the first walkable tile when the preferred point is
    /// blocked or off the map. `None` only for a map with no walkable tile.
    pub fn spawn_point(&self, slot_id: u8) -> Option<(i32, i32)> {
        let (x, y) = SPAWN_POINTS[slot_id as usize % SPAWN_POINTS.len()];
        if self.is_walkable(x, y) {
            return Some((x, y));
        }

        self.tiles
            .iter()
            .position(|tile| tile.walkable)
            .map(|index| (index as i32 % self.width, index as i32 / self.width))
    }
}

fn check_dimensions(width: i32, height: i32) -> Result<(), MapError> {
    if !(1..=MAX_GRID_DIMENSION).contains(&width) || !(1..=MAX_GRID_DIMENSION).contains(&height) {
        return Err(MapError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Reads the map file at `path`. Failure here is fatal for the server.
pub fn load_map(path: impl AsRef<Path>, width: i32, height: i32) -> Result<Grid, MapError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let grid = Grid::parse(&text, width, height)?;
    let total = (width * height) as usize;
    let walkable = grid.walkable_count();
    info!(
        "Map loaded from {}: {}/{} tiles walkable ({:.1}%)",
        path.display(),
        walkable,
        total,
        walkable as f32 / total as f32 * 100.0
    );
    Ok(grid)
}
