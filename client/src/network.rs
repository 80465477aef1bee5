use log::{debug, info, warn};
use shared::{encode_frame, FrameBuffer, FrameError, Packet, ProtocolError};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
}

/// Reads until one complete frame is buffered.
///
/// Returns `None` once the stream ends. Cancel safe: partial reads stay in
/// `frames` for the next call.
pub async fn read_frame<R>(reader: &mut R, frames: &mut FrameBuffer) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(frame) = frames.next_frame() {
            return Ok(Some(frame));
        }
        if reader.read_buf(frames.buffer_mut()).await? == 0 {
            if frames.pending_len() > 0 {
                warn!(
                    "Stream ended inside a frame, {} bytes discarded",
                    frames.pending_len()
                );
            }
            return Ok(None);
        }
    }
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(&packet.encode()?)?;
    writer.write_all(&frame).await?;
    Ok(())
}

pub struct Connection {
    stream: TcpStream,
    frames: FrameBuffer,
    server_addr: SocketAddr,
}

impl Connection {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let server_addr = stream.peer_addr()?;
        info!("Connected to {}", server_addr);

        Ok(Connection {
            stream,
            frames: FrameBuffer::new(),
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        write_packet(&mut self.stream, packet).await
    }

    /// Next packet from the server, or `None` once it closed the connection.
    ///
    /// Messages that fail to decode are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<Packet>, ClientError> {
        while let Some(frame) = read_frame(&mut self.stream, &mut self.frames).await? {
            match Packet::decode(&frame) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => warn!("Skipping bad packet from server: {}", e),
            }
        }
        debug!("Server {} closed the connection", self.server_addr);
        Ok(None)
    }
}
