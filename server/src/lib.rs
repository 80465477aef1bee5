//! # Tile Sync Server Library
//!
//! This library provides the authoritative server for a small multiplayer
//! tile-map game. Clients connect over TCP, receive the map in chunks, send
//! single-tile moves and get every other player's position back.
//!
//! ## Core Responsibilities
//!
//! ### World Authority
//! The server owns the map and every player's position. A client only ever
//! asks to move; the server decides whether the step is legal and everyone,
//! the mover included, learns the result from the next position snapshot.
//!
//! ### Session Management
//! Handles the complete lifecycle of a player:
//! - Slot assignment, spawn placement and colour selection
//! - Refusal when every slot is taken
//! - Slot release and departure broadcasts on disconnect
//! - Optional removal of idle sessions
//!
//! ### Map Streaming
//! The map is split into 5x5 chunks. A joining player receives all of them;
//! afterwards a move that crosses a chunk boundary pushes the destination
//! chunk and the neighbours in the direction the player is heading.
//!
//! ## Architecture Design
//!
//! ### Single Event Consumer
//! Connection tasks only move bytes. Every connect, message and disconnect is
//! funnelled into one queue and applied to the game state in arrival order,
//! so the world is never touched concurrently and every player observes
//! the same sequence of snapshots.
//!
//! ### Framed TCP
//! Each packet travels inside a two-byte length frame. A malformed or unknown
//! packet therefore costs one message, never the stream.
//!
//! ## Module Organization
//!
//! - `grid`: map loading, tile lookup, chunk extraction and spawn points
//! - `chunk_streamer`: which chunks to push on join and on chunk change
//! - `session`: connection to slot mapping and per-player state
//! - `movement`: pure move validation
//! - `replication`: builders for the packets describing players
//! - `game`: the state machine turning events into outbound messages
//! - `network`: TCP transport and the event loop
//! - `config`: runtime settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::grid::load_map;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     config.validate()?;
//!
//!     let grid = load_map(&config.map_path, config.map_width, config.map_height)?;
//!     let server = Server::bind(&config, grid).await?;
//!
//!     // Accepts clients and processes their events until the task is dropped
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chunk_streamer;
pub mod config;
pub mod game;
pub mod grid;
pub mod movement;
pub mod network;
pub mod replication;
pub mod session;
