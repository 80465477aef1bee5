//! Server network layer: TCP transport and the event loop driving the game state

use crate::config::ServerConfig;
use crate::game::{GameState, Outgoing};
use crate::grid::Grid;
use crate::session::ConnectionId;
use log::{debug, error, info, warn};
use shared::{encode_frame, FrameBuffer, FrameError, Packet, ProtocolError};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
}

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum TransportEvent {
    Connected {
        connection: ConnectionId,
        addr: SocketAddr,
        commands: mpsc::UnboundedSender<PeerCommand>,
    },
    Received {
        connection: ConnectionId,
        payload: Vec<u8>,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

/// Messages sent from the main server loop to a connection task
#[derive(Debug, Clone)]
pub enum PeerCommand {
    /// Already framed bytes, shared between the recipients of a broadcast
    Send(Arc<[u8]>),
    Close,
}

/// Encodes a packet and prefixes it with its frame header.
pub fn frame_packet(packet: &Packet) -> Result<Arc<[u8]>, NetworkError> {
    let payload = packet.encode()?;
    Ok(encode_frame(&payload)?.into())
}

/// Owns one client stream until either side closes it.
///
/// Every complete frame is forwarded as a `Received` event. The task always
/// finishes by reporting `Disconnected`, whoever initiated the close.
pub async fn drive_connection<S>(
    connection: ConnectionId,
    stream: S,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<PeerCommand>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut frames = FrameBuffer::new();

    loop {
        tokio::select! {
            read = reader.read_buf(frames.buffer_mut()) => match read {
                Ok(0) => {
                    debug!("{} closed by peer", connection);
                    break;
                }
                Ok(_) => {
                    while let Some(payload) = frames.next_frame() {
                        if events.send(TransportEvent::Received { connection, payload }).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Read error on {}: {}", connection, e);
                    break;
                }
            },

            command = commands.recv() => match command {
                Some(PeerCommand::Send(frame)) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        warn!("Write error on {}: {}", connection, e);
                        break;
                    }
                }
                Some(PeerCommand::Close) | None => {
                    debug!("Closing {}", connection);
                    break;
                }
            },
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} failed: {}", connection, e);
    }
    let _ = events.send(TransportEvent::Disconnected { connection });
}

/// Main server coordinating the transport and the game state
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game_state: GameState,
    idle_timeout: Option<Duration>,
    peers: HashMap<ConnectionId, mpsc::UnboundedSender<PeerCommand>>,

    // Communication channels
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Server {
    pub async fn bind(config: &ServerConfig, grid: Grid) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game_state: GameState::from_config(grid, config),
            idle_timeout: config.idle_timeout,
            peers: HashMap::new(),
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts clients and starts one task per connection
    fn spawn_acceptor(listener: TcpListener, events: mpsc::UnboundedSender<TransportEvent>) {
        tokio::spawn(async move {
            let mut next_id: u32 = 0;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Failed to disable Nagle for {}: {}", addr, e);
                        }
                        let connection = ConnectionId(next_id);
                        next_id = next_id.wrapping_add(1);

                        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
                        if events
                            .send(TransportEvent::Connected {
                                connection,
                                addr,
                                commands: commands_tx,
                            })
                            .is_err()
                        {
                            error!("Event loop gone, stopping acceptor");
                            break;
                        }
                        tokio::spawn(drive_connection(
                            connection,
                            stream,
                            events.clone(),
                            commands_rx,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Routes one transport event into the game state
    fn dispatch(&mut self, event: TransportEvent) -> Vec<Outgoing> {
        match event {
            TransportEvent::Connected {
                connection,
                addr,
                commands,
            } => {
                info!("{} connected from {}", connection, addr);
                self.peers.insert(connection, commands);
                self.game_state.handle_connect(connection)
            }
            TransportEvent::Received {
                connection,
                payload,
            } => self.game_state.handle_packet(connection, &payload),
            TransportEvent::Disconnected { connection } => {
                if self.peers.remove(&connection).is_some() {
                    info!("{} disconnected", connection);
                }
                self.game_state.handle_disconnect(connection)
            }
        }
    }

    fn deliver(&self, connection: ConnectionId, frame: Arc<[u8]>) {
        match self.peers.get(&connection) {
            Some(peer) => {
                if peer.send(PeerCommand::Send(frame)).is_err() {
                    debug!("{} already closed, dropping message", connection);
                }
            }
            None => debug!("No transport for {}, dropping message", connection),
        }
    }

    /// Hands queued messages to the connection tasks, in order
    fn flush(&mut self, outgoing: Vec<Outgoing>) {
        for message in outgoing {
            match message {
                Outgoing::Send { to, packet } => match frame_packet(&packet) {
                    Ok(frame) => self.deliver(to, frame),
                    Err(e) => error!("Failed to encode {} for {}: {}", packet.kind(), to, e),
                },
                Outgoing::Broadcast { recipients, packet } => match frame_packet(&packet) {
                    Ok(frame) => {
                        for to in recipients {
                            self.deliver(to, Arc::clone(&frame));
                        }
                    }
                    Err(e) => error!("Failed to encode {} broadcast: {}", packet.kind(), e),
                },
                Outgoing::Close { to } => {
                    if let Some(peer) = self.peers.remove(&to) {
                        let _ = peer.send(PeerCommand::Close);
                    }
                }
            }
        }
    }

    /// Runs until the process is stopped.
    ///
    /// Events are handled strictly one at a time. Everything already queued
    /// when the loop wakes up is processed as one batch before flushing.
    pub async fn run(mut self) -> Result<(), NetworkError> {
        if let Some(listener) = self.listener.take() {
            Self::spawn_acceptor(listener, self.event_tx.clone());
        }

        let mut idle_check = interval(Duration::from_secs(1));
        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        info!("Server shutting down");
                        break;
                    };
                    let mut outgoing = self.dispatch(event);
                    while let Ok(event) = self.event_rx.try_recv() {
                        outgoing.extend(self.dispatch(event));
                    }
                    self.flush(outgoing);
                },

                _ = idle_check.tick(), if self.idle_timeout.is_some() => {
                    if let Some(timeout) = self.idle_timeout {
                        let outgoing = self.game_state.expire_idle(timeout);
                        self.flush(outgoing);
                    }
                },
            }
        }

        Ok(())
    }
}
