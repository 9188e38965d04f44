//! Byte-stream transport to the master agent.
//!
//! AgentX runs over a reliable stream (Unix domain socket or TCP, RFC 2741
//! §8). PDUs are self-delimiting: the receiver reads the fixed 20-byte
//! header, takes `payload_length` from it and then reads exactly that many
//! payload bytes. Partial frames are kept in the transport, so a `receive`
//! dropped mid-read (e.g. inside `tokio::select!`) loses nothing.

use std::future::Future;
use std::io;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::{
    error::Result,
    pdu::{frame_payload_length, PDU_HEADER_SIZE},
};

/// Default path of the master agent's AgentX socket (RFC 2741 §8.2.1).
pub const DEFAULT_SOCKET_PATH: &str = "/var/agentx/master";

/// A connection carrying whole AgentX frames.
///
/// The session owns its transport exclusively, so methods take `&mut self`.
pub trait Transport: Send {
    /// Writes one encoded PDU.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Reads one complete PDU frame (header and payload).
    fn receive(&mut self) -> impl Future<Output = Result<Bytes>> + Send;

    /// Closes the write side of the connection.
    fn shutdown(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// [`Transport`] over any tokio byte stream.
pub struct StreamTransport<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        StreamTransport {
            stream,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Splits one complete frame off the front of the buffer, if there is one.
    fn take_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < PDU_HEADER_SIZE {
            return Ok(None);
        }
        let mut header = [0u8; PDU_HEADER_SIZE];
        header.copy_from_slice(&self.buffer[..PDU_HEADER_SIZE]);
        let frame_len = PDU_HEADER_SIZE + frame_payload_length(&header)?;
        if self.buffer.len() < frame_len {
            self.buffer.reserve(frame_len - self.buffer.len());
            return Ok(None);
        }
        Ok(Some(self.buffer.split_to(frame_len).freeze()))
    }
}

/// Connects to a master agent listening on a Unix domain socket.
#[cfg(unix)]
pub async fn connect_unix(
    path: impl AsRef<Path>,
) -> Result<StreamTransport<tokio::net::UnixStream>> {
    let stream = tokio::net::UnixStream::connect(path.as_ref()).await?;
    log::info!("Connected to AgentX master at {}", path.as_ref().display());
    Ok(StreamTransport::new(stream))
}

/// Connects to a master agent listening on TCP.
pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<StreamTransport<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    log::info!("Connected to AgentX master at {}", stream.peer_addr()?);
    Ok(StreamTransport::new(stream))
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }
            // read_buf is cancel safe; bytes read so far stay in the buffer.
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed ({} bytes of a frame pending)", self.buffer.len()),
                )
                .into());
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
