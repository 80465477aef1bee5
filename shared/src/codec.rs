//! Byte layout of the six wire packets.
//!
//! Every packet starts with a one-byte tag followed by a fixed-width body.
//! Bodies are written with bincode's fixed-int encoding, which lays out
//! `u8`/`i8`/`bool` fields and fixed arrays back to back with no padding or
//! length prefixes. `PlayerPositions` is the only variable-size packet: its
//! count byte tells the receiver how many 3-byte entries follow.

use crate::{Packet, PlayerEntry, Tile, CHUNK_TILES};
use bincode::{deserialize, serialize};
use thiserror::Error;

pub const TAG_TILE_CHUNK: u8 = 0x01;
pub const TAG_MOVE: u8 = 0x02;
pub const TAG_PLAYER_POSITIONS: u8 = 0x03;
pub const TAG_PLAYER_ID: u8 = 0x04;
pub const TAG_ADD_PLAYER: u8 = 0x05;
pub const TAG_REMOVE_PLAYER: u8 = 0x06;

pub const TILE_CHUNK_LEN: usize = 3 + CHUNK_TILES * 2;
pub const MOVE_LEN: usize = 3;
pub const POSITIONS_HEADER_LEN: usize = 2;
pub const POSITION_ENTRY_LEN: usize = 3;
pub const PLAYER_ID_LEN: usize = 3;
pub const ADD_PLAYER_LEN: usize = 3;
pub const REMOVE_PLAYER_LEN: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unknown packet tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("packet 0x{tag:02x} needs {expected} bytes, got {actual}")]
    Undersized {
        tag: u8,
        expected: usize,
        actual: usize,
    },
    #[error("snapshot holds {0} entries but the count byte only fits 255")]
    TooManyEntries(usize),
    #[error("malformed packet body: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for ProtocolError {
    fn from(err: bincode::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

fn require(tag: u8, buf: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if buf.len() < expected {
        return Err(ProtocolError::Undersized {
            tag,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::TileChunk { .. } => TAG_TILE_CHUNK,
            Packet::Move { .. } => TAG_MOVE,
            Packet::PlayerPositions { .. } => TAG_PLAYER_POSITIONS,
            Packet::PlayerId { .. } => TAG_PLAYER_ID,
            Packet::AddPlayer { .. } => TAG_ADD_PLAYER,
            Packet::RemovePlayer { .. } => TAG_REMOVE_PLAYER,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::TileChunk { .. } => "TileChunk",
            Packet::Move { .. } => "Move",
            Packet::PlayerPositions { .. } => "PlayerPositions",
            Packet::PlayerId { .. } => "PlayerId",
            Packet::AddPlayer { .. } => "AddPlayer",
            Packet::RemovePlayer { .. } => "RemovePlayer",
        }
    }

    /// Number of bytes `encode` produces for this packet.
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::TileChunk { .. } => TILE_CHUNK_LEN,
            Packet::Move { .. } => MOVE_LEN,
            Packet::PlayerPositions { players } => {
                POSITIONS_HEADER_LEN + players.len() * POSITION_ENTRY_LEN
            }
            Packet::PlayerId { .. } => PLAYER_ID_LEN,
            Packet::AddPlayer { .. } => ADD_PLAYER_LEN,
            Packet::RemovePlayer { .. } => REMOVE_PLAYER_LEN,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.tag());

        match self {
            Packet::TileChunk {
                chunk_x,
                chunk_y,
                tiles,
            } => out.extend(serialize(&(chunk_x, chunk_y, tiles))?),
            Packet::Move { dir_x, dir_y } => out.extend(serialize(&(dir_x, dir_y))?),
            Packet::PlayerPositions { players } => {
                let count = u8::try_from(players.len())
                    .map_err(|_| ProtocolError::TooManyEntries(players.len()))?;
                out.push(count);
                for entry in players {
                    out.extend(serialize(entry)?);
                }
            }
            Packet::PlayerId {
                player_id,
                color_index,
            }
            | Packet::AddPlayer {
                player_id,
                color_index,
            } => out.extend(serialize(&(player_id, color_index))?),
            Packet::RemovePlayer { player_id } => out.push(*player_id),
        }

        Ok(out)
    }

    /// Parses a received message, dispatching on its first byte.
    ///
    /// The buffer is size-checked against the layout implied by the tag
    /// before any field is read. Bytes past the end of the layout are
    /// ignored.
    pub fn decode(buf: &[u8]) -> Result<Packet, ProtocolError> {
        let (&tag, body) = buf.split_first().ok_or(ProtocolError::Empty)?;

        match tag {
            TAG_TILE_CHUNK => {
                require(tag, buf, TILE_CHUNK_LEN)?;
                let (chunk_x, chunk_y, tiles): (u8, u8, [Tile; CHUNK_TILES]) =
                    deserialize(body)?;
                Ok(Packet::TileChunk {
                    chunk_x,
                    chunk_y,
                    tiles,
                })
            }
            TAG_MOVE => {
                require(tag, buf, MOVE_LEN)?;
                let (dir_x, dir_y): (i8, i8) = deserialize(body)?;
                Ok(Packet::Move { dir_x, dir_y })
            }
            TAG_PLAYER_POSITIONS => {
                require(tag, buf, POSITIONS_HEADER_LEN)?;
                let count = body[0] as usize;
                require(
                    tag,
                    buf,
                    POSITIONS_HEADER_LEN + count * POSITION_ENTRY_LEN,
                )?;
                let players = body[1..]
                    .chunks_exact(POSITION_ENTRY_LEN)
                    .take(count)
                    .map(|entry| deserialize::<PlayerEntry>(entry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Packet::PlayerPositions { players })
            }
            TAG_PLAYER_ID => {
                require(tag, buf, PLAYER_ID_LEN)?;
                let (player_id, color_index): (u8, u8) = deserialize(body)?;
                Ok(Packet::PlayerId {
                    player_id,
                    color_index,
                })
            }
            TAG_ADD_PLAYER => {
                require(tag, buf, ADD_PLAYER_LEN)?;
                let (player_id, color_index): (u8, u8) = deserialize(body)?;
                Ok(Packet::AddPlayer {
                    player_id,
                    color_index,
                })
            }
            TAG_REMOVE_PLAYER => {
                require(tag, buf, REMOVE_PLAYER_LEN)?;
                Ok(Packet::RemovePlayer { player_id: body[0] })
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}
