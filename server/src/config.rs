use shared::{DEFAULT_PORT, MAX_GRID_DIMENSION, MAX_PLAYERS, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max players must be between 1 and 255, got {0}")]
    MaxPlayers(usize),
    #[error("map size {0}x{1} must be between 1x1 and {max}x{max}", max = MAX_GRID_DIMENSION)]
    MapSize(i32, i32),
    #[error("idle timeout must be greater than zero")]
    IdleTimeout,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_players: usize,
    pub map_path: PathBuf,
    pub map_width: i32,
    pub map_height: i32,
    /// Serve an all-walkable map when the map file cannot be loaded
    pub default_map_fallback: bool,
    /// Send a one-player snapshot back to clients whose move was rejected
    pub correct_rejected_moves: bool,
    /// Forcibly remove sessions that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_players: MAX_PLAYERS,
            map_path: PathBuf::from("map.txt"),
            map_width: VIEWPORT_WIDTH,
            map_height: VIEWPORT_HEIGHT,
            default_map_fallback: false,
            correct_rejected_moves: true,
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=u8::MAX as usize).contains(&self.max_players) {
            return Err(ConfigError::MaxPlayers(self.max_players));
        }
        let dimension = 1..=MAX_GRID_DIMENSION;
        if !dimension.contains(&self.map_width) || !dimension.contains(&self.map_height) {
            return Err(ConfigError::MapSize(self.map_width, self.map_height));
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::IdleTimeout);
        }
        Ok(())
    }
}
