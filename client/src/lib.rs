//! # Tile Sync Client Library
//!
//! Headless client for the tile sync server. It keeps a local mirror of
//! everything the server publishes and can drive a player around with a
//! random walk, which makes it useful for smoke tests and load generation.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Framed TCP connection to the server:
//! - Connection setup
//! - Packet encoding and frame reassembly
//! - Skipping of undecodable messages
//!
//! ### World Module (`world`)
//! Mirror of the server state: the tiles received so far, the known players
//! and their last reported positions, and the identity assigned to us.
//!
//! ### Bot Module (`bot`)
//! Chooses the next step of a random walk over tiles the mirror knows to be
//! walkable. The server remains the judge of every move.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Connection;
//! use client::world::ClientWorld;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut connection = Connection::connect("127.0.0.1:1234").await?;
//!     let mut world = ClientWorld::new(20, 15);
//!
//!     while let Some(packet) = connection.recv().await? {
//!         world.apply(&packet);
//!         if world.local_player().and_then(|p| p.position).is_some() {
//!             break;
//!         }
//!     }
//!
//!     println!("Spawned at {:?}", world.local_player());
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod network;
pub mod world;
