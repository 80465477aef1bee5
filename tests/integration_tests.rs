//! Integration tests for the tile sync server and client
//!
//! These tests validate cross-component interactions: the game state machine
//! driven through whole join/move/leave sequences, and real TCP sessions
//! between the server and the client crate.

use client::network::{read_frame, Connection};
use client::world::ClientWorld;
use server::config::ServerConfig;
use server::game::{GameState, Outgoing};
use server::grid::Grid;
use server::network::Server;
use server::session::ConnectionId;
use shared::{FrameBuffer, Packet, PlayerEntry};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

fn received(outgoing: &[Outgoing], connection: ConnectionId) -> Vec<Packet> {
    outgoing
        .iter()
        .filter_map(|message| message.delivered_to(connection))
        .cloned()
        .collect()
}

fn move_bytes(dir_x: i8, dir_y: i8) -> Vec<u8> {
    Packet::Move { dir_x, dir_y }.encode().unwrap()
}

fn chunk_coords(packets: &[Packet]) -> Vec<(u8, u8)> {
    packets
        .iter()
        .filter_map(|packet| match packet {
            Packet::TileChunk {
                chunk_x, chunk_y, ..
            } => Some((*chunk_x, *chunk_y)),
            _ => None,
        })
        .collect()
}

/// GAME STATE SCENARIOS
mod scenario_tests {
    use super::*;

    const A: ConnectionId = ConnectionId(10);
    const B: ConnectionId = ConnectionId(11);

    fn open_game() -> GameState {
        GameState::new(Grid::all_walkable(20, 15).unwrap(), 32)
    }

    /// Walks the player on `connection` from its (5, 5) spawn to (6, 6)
    fn walk_to_six_six(game: &mut GameState, connection: ConnectionId) {
        game.handle_packet(connection, &move_bytes(1, 1));
        let slot = game.sessions().lookup(connection).unwrap();
        assert_eq!(game.sessions().player(slot).unwrap().position(), (6, 6));
    }

    #[test]
    fn single_player_join_receives_map_and_identity() {
        let mut game = open_game();
        let packets = received(&game.handle_connect(A), A);

        assert_eq!(chunk_coords(&packets).len(), 12);
        assert_eq!(
            packets
                .iter()
                .filter(|p| matches!(p, Packet::PlayerId { .. }))
                .count(),
            1
        );
        assert_eq!(
            packets
                .iter()
                .filter(|p| matches!(p, Packet::AddPlayer { .. }))
                .count(),
            1
        );

        let id_at = packets
            .iter()
            .position(|p| matches!(p, Packet::PlayerId { .. }))
            .unwrap();
        let add_at = packets
            .iter()
            .position(|p| matches!(p, Packet::AddPlayer { .. }))
            .unwrap();
        assert!(id_at < add_at);

        // Every chunk of the 4x3 grid exactly once
        let mut coords = chunk_coords(&packets);
        coords.sort();
        let expected: Vec<(u8, u8)> = (0..4)
            .flat_map(|x| (0..3).map(move |y| (x, y)))
            .collect();
        assert_eq!(coords, expected);
    }

    #[test]
    fn move_within_chunk_sends_only_snapshot() {
        let mut game = open_game();
        game.handle_connect(A);
        walk_to_six_six(&mut game, A);

        let out = game.handle_packet(A, &move_bytes(1, 0));
        let packets = received(&out, A);

        assert!(chunk_coords(&packets).is_empty());
        assert_eq!(
            packets,
            vec![Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 7, y: 6 }]
            }]
        );
    }

    #[test]
    fn move_across_chunk_boundary_pushes_look_ahead() {
        let mut game = open_game();
        game.handle_connect(A);
        walk_to_six_six(&mut game, A);
        for _ in 0..3 {
            game.handle_packet(A, &move_bytes(1, 0));
        }
        assert_eq!(game.sessions().player(0).unwrap().position(), (9, 6));

        let out = game.handle_packet(A, &move_bytes(1, 0));
        let packets = received(&out, A);

        // Landing on column 0 and row 1 of chunk (2, 1) looks left and up
        assert_eq!(
            chunk_coords(&packets),
            vec![(2, 1), (1, 1), (2, 0), (1, 0)]
        );
        assert_eq!(
            packets.last(),
            Some(&Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 10, y: 6 }]
            })
        );
    }

    #[test]
    fn look_ahead_never_leaves_the_map() {
        let mut game = open_game();
        game.handle_connect(A);

        // Walk along the top row to the right edge
        game.handle_packet(A, &move_bytes(0, -1));
        for _ in 0..5 {
            game.handle_packet(A, &move_bytes(0, -1));
        }
        for _ in 0..20 {
            let out = game.handle_packet(A, &move_bytes(1, 0));
            for (x, y) in chunk_coords(&received(&out, A)) {
                assert!(x < 4 && y < 3, "chunk ({}, {}) is off the map", x, y);
            }
        }
        assert_eq!(game.sessions().player(0).unwrap().position(), (19, 0));
    }

    #[test]
    fn disconnect_frees_slot_for_next_connect() {
        let mut game = open_game();
        game.handle_connect(A);
        game.handle_connect(B);

        let out = game.handle_disconnect(A);
        assert_eq!(
            received(&out, B)[0],
            Packet::RemovePlayer { player_id: 0 }
        );

        let c = ConnectionId(12);
        let packets = received(&game.handle_connect(c), c);
        assert_eq!(
            packets[0],
            Packet::PlayerId {
                player_id: 0,
                color_index: 0
            }
        );
    }

    #[test]
    fn rejected_moves_never_change_position() {
        let text = "1 1 1 1 1\n1 2 2 2 1\n1 2 1 2 1\n1 2 2 2 1\n1 1 1 1 1\n";
        let mut game = GameState::new(Grid::parse(text, 5, 5).unwrap(), 4);
        game.handle_connect(A);
        // Spawn (5, 5) is off a 5x5 map, so the first walkable tile is used
        assert_eq!(game.sessions().player(0).unwrap().position(), (0, 0));

        for (dir_x, dir_y) in [(-1, 0), (0, -1), (1, 1), (5, 0), (-1, -1)] {
            game.handle_packet(A, &move_bytes(dir_x, dir_y));
            assert_eq!(game.sessions().player(0).unwrap().position(), (0, 0));
        }

        // Walkable targets are accepted and show up in the snapshot
        let out = game.handle_packet(A, &move_bytes(1, 0));
        assert_eq!(
            received(&out, A),
            vec![Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 1, y: 0 }]
            }]
        );
    }

    #[test]
    fn snapshot_count_matches_active_sessions() {
        let mut game = open_game();
        for id in 0..10 {
            game.handle_connect(ConnectionId(id));
        }
        for id in [1, 4, 7] {
            game.handle_disconnect(ConnectionId(id));
        }

        let out = game.handle_packet(ConnectionId(0), &move_bytes(0, 1));
        match received(&out, ConnectionId(0)).pop() {
            Some(Packet::PlayerPositions { players }) => {
                assert_eq!(players.len(), game.sessions().len());
                assert_eq!(players.len(), 7);
            }
            other => panic!("Expected a snapshot, got {:?}", other),
        }
    }
}

/// REAL NETWORK TESTS
mod network_tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_server(config: ServerConfig) -> SocketAddr {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..config
        };
        let server = Server::bind(&config, Grid::all_walkable(20, 15).unwrap())
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr();
        tokio::spawn(server.run());
        addr
    }

    async fn next_packet(connection: &mut Connection) -> Packet {
        timeout(WAIT, connection.recv())
            .await
            .expect("Timed out waiting for packet")
            .expect("Receive failed")
            .expect("Server closed the connection")
    }

    /// Reads packets into the mirror until `done` holds
    async fn sync_until<F>(connection: &mut Connection, world: &mut ClientWorld, done: F)
    where
        F: Fn(&ClientWorld) -> bool,
    {
        while !done(world) {
            let packet = next_packet(connection).await;
            world.apply(&packet);
        }
    }

    #[tokio::test]
    async fn join_move_leave_over_tcp() {
        let addr = start_server(ServerConfig::default()).await;

        let mut alice = Connection::connect(addr).await.unwrap();
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::PlayerId {
                player_id: 0,
                color_index: 0
            }
        );
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::AddPlayer {
                player_id: 0,
                color_index: 0
            }
        );
        for _ in 0..12 {
            assert!(matches!(
                next_packet(&mut alice).await,
                Packet::TileChunk { .. }
            ));
        }
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 5, y: 5 }]
            }
        );

        let mut bob = Connection::connect(addr).await.unwrap();
        let mut bob_world = ClientWorld::new(20, 15);
        sync_until(&mut bob, &mut bob_world, |w| {
            w.known_tiles() == 300 && w.players().all(|p| p.position.is_some())
        })
        .await;
        assert_eq!(bob_world.local_id(), Some(1));
        assert_eq!(bob_world.players().count(), 2);

        assert_eq!(
            next_packet(&mut alice).await,
            Packet::AddPlayer {
                player_id: 1,
                color_index: 1
            }
        );
        assert!(matches!(
            next_packet(&mut alice).await,
            Packet::PlayerPositions { players } if players.len() == 2
        ));

        alice.send(&Packet::Move { dir_x: 1, dir_y: 0 }).await.unwrap();
        let expected = Packet::PlayerPositions {
            players: vec![
                PlayerEntry { id: 0, x: 6, y: 5 },
                PlayerEntry { id: 1, x: 5, y: 8 },
            ],
        };
        assert_eq!(next_packet(&mut alice).await, expected);
        assert_eq!(next_packet(&mut bob).await, expected);

        drop(bob);
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::RemovePlayer { player_id: 1 }
        );
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 6, y: 5 }]
            }
        );
    }

    #[tokio::test]
    async fn garbage_does_not_break_the_session() {
        let addr = start_server(ServerConfig::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut frames = FrameBuffer::new();
        // PlayerId, AddPlayer, 12 chunks, snapshot
        for _ in 0..15 {
            timeout(WAIT, read_frame(&mut stream, &mut frames))
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }

        // Unknown tag, undersized move, empty frame, then a real move
        stream
            .write_all(&[0, 2, 0x42, 0, 0, 2, 0x02, 1, 0, 0, 0, 3, 0x02, 0, 1])
            .await
            .unwrap();

        let frame = timeout(WAIT, read_frame(&mut stream, &mut frames))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            Packet::decode(&frame).unwrap(),
            Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 5, y: 6 }]
            }
        );
    }

    #[tokio::test]
    async fn rejected_move_gets_private_correction() {
        let addr = start_server(ServerConfig::default()).await;

        let mut alice = Connection::connect(addr).await.unwrap();
        let mut world = ClientWorld::new(20, 15);
        sync_until(&mut alice, &mut world, |w| {
            w.local_player().and_then(|p| p.position).is_some()
        })
        .await;

        alice.send(&Packet::Move { dir_x: 4, dir_y: 0 }).await.unwrap();
        assert_eq!(
            next_packet(&mut alice).await,
            Packet::PlayerPositions {
                players: vec![PlayerEntry { id: 0, x: 5, y: 5 }]
            }
        );
    }

    #[tokio::test]
    async fn full_server_closes_extra_connection() {
        let addr = start_server(ServerConfig {
            max_players: 1,
            ..ServerConfig::default()
        })
        .await;

        let mut first = Connection::connect(addr).await.unwrap();
        next_packet(&mut first).await;

        let mut second = Connection::connect(addr).await.unwrap();
        let result = timeout(WAIT, second.recv()).await.unwrap().unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn idle_session_is_removed() {
        let addr = start_server(ServerConfig {
            idle_timeout: Some(Duration::from_millis(200)),
            ..ServerConfig::default()
        })
        .await;

        let mut idle = Connection::connect(addr).await.unwrap();
        let mut world = ClientWorld::new(20, 15);
        sync_until(&mut idle, &mut world, |w| {
            w.local_player().and_then(|p| p.position).is_some()
        })
        .await;

        // The idle check runs once a second; nothing is sent in the meantime
        let closed = timeout(WAIT, async {
            loop {
                match idle.recv().await {
                    Ok(Some(_)) => continue,
                    _ => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }
}
