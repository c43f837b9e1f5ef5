//! TCP transport: a connection-oriented backend for the traversal methods
//! that need a reliable stream (TCP simultaneous-open, predictive TCP hole
//! punch). Since [`Transport`] models each call as one discrete message,
//! every `send_to`/`recv_from` is framed with a 4-byte big-endian length
//! prefix over the underlying stream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::transport::{Transport, TransportError, TransportResult, TransportStats};

/// Largest single frame accepted; guards against a corrupt length prefix
/// driving an unbounded read.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// TCP transport over one already-established connection.
///
/// `send_to` requires its destination to match the connected peer —
/// `Transport`'s per-call address is a compatibility shim over what is,
/// underneath, a point-to-point stream.
pub struct TcpTransport {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
}

impl TcpTransport {
    /// Connect to `peer`, establishing the stream this transport frames
    /// messages over.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionFailed` if the connection
    /// attempt fails.
    pub async fn connect(peer: SocketAddr) -> TransportResult<Self> {
        let stream = TcpStream::connect(peer)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Self::from_stream(stream, peer)
    }

    /// Wrap an already-connected stream, e.g. one returned from a
    /// listener's `accept()`.
    ///
    /// # Errors
    /// Returns `TransportError::Io` if the stream's local address cannot
    /// be read.
    pub fn from_stream(stream: TcpStream, peer_addr: SocketAddr) -> TransportResult<Self> {
        let local_addr = stream.local_addr().map_err(TransportError::Io)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer_addr,
            local_addr,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
        })
    }

    /// The address of the peer this transport is connected to.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> TransportResult<usize> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        if addr != self.peer_addr {
            return Err(TransportError::ConnectionFailed(format!(
                "tcp transport is connected to {}, not {addr}",
                self.peer_addr
            )));
        }

        let len = u32::try_from(buf.len())
            .map_err(|_| TransportError::Other("message too large to frame".to_string()))?;

        let result: std::io::Result<()> = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(&len.to_be_bytes()).await?;
            writer.write_all(buf).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.bytes_sent.fetch_add(buf.len() as u64, Ordering::Relaxed);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(buf.len())
            }
            Err(e) => {
                self.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Io(e))
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }

        let result: std::io::Result<usize> = async {
            let mut reader = self.reader.lock().await;
            let mut len_bytes = [0u8; 4];
            reader.read_exact(&mut len_bytes).await?;
            let len = u32::from_be_bytes(len_bytes);
            if len > MAX_FRAME_BYTES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "frame exceeds maximum size",
                ));
            }
            let len = len as usize;
            if len > buf.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "frame larger than receive buffer",
                ));
            }
            reader.read_exact(&mut buf[..len]).await?;
            Ok(len)
        }
        .await;

        match result {
            Ok(len) => {
                self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                self.packets_received.fetch_add(1, Ordering::Relaxed);
                Ok((len, self.peer_addr))
            }
            Err(e) => {
                self.recv_errors.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Io(e))
            }
        }
    }

    fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}
