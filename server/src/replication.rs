//! Builders for the packets that replicate player state to clients.

use crate::session::{PlayerState, SessionTable};
use shared::{Packet, PlayerEntry};

fn entry(player: &PlayerState) -> PlayerEntry {
    // Grid dimensions are capped at i8::MAX, so positions always fit
    PlayerEntry {
        id: player.slot_id,
        x: player.x as i8,
        y: player.y as i8,
    }
}

/// Positions of every active player, in session-table order.
pub fn snapshot(sessions: &SessionTable) -> Packet {
    Packet::PlayerPositions {
        players: sessions.active_players().map(entry).collect(),
    }
}

/// Single-entry snapshot used to correct a client after a rejected move.
pub fn snapshot_of(player: &PlayerState) -> Packet {
    Packet::PlayerPositions {
        players: vec![entry(player)],
    }
}

pub fn identity(player: &PlayerState) -> Packet {
    Packet::PlayerId {
        player_id: player.slot_id,
        color_index: player.color_index,
    }
}

pub fn announce(player: &PlayerState) -> Packet {
    Packet::AddPlayer {
        player_id: player.slot_id,
        color_index: player.color_index,
    }
}

pub fn departure(slot_id: u8) -> Packet {
    Packet::RemovePlayer { player_id: slot_id }
}
