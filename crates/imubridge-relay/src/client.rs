use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use imubridge_frame::{CombinedFrame, FrameConfig};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Downstream consumer of the relay stream.
///
/// The wire carries no framing of its own: every combined frame is exactly
/// `combined_len` bytes, so the client reads fixed-size records.
pub struct RelayClient {
    stream: TcpStream,
    peer: SocketAddr,
    buf: Vec<u8>,
    filled: usize,
    received: u64,
}

impl RelayClient {
    /// Connect to a relay using the default frame layout.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_len(addr, FrameConfig::default().combined_len())
    }

    /// Connect to a relay whose combined frames are `frame_len` bytes.
    pub fn connect_with_len(addr: impl ToSocketAddrs, frame_len: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(RelayError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "combined frame length must be non-zero",
            )));
        }
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!(%peer, frame_len, "connected to relay");
        Ok(Self {
            stream,
            peer,
            buf: vec![0u8; frame_len],
            filled: 0,
            received: 0,
        })
    }

    /// Receive the next combined frame (blocking).
    ///
    /// A close at any point yields [`RelayError::Disconnected`]; a partial
    /// record is unusable. A read timeout returns [`RelayError::Io`] but keeps
    /// the bytes already received, so the next call resumes the same record.
    pub fn recv(&mut self) -> Result<CombinedFrame> {
        while self.filled < self.buf.len() {
            match self.stream.read(&mut self.buf[self.filled..]) {
                Ok(0) => return Err(RelayError::Disconnected(self.peer.to_string())),
                Ok(n) => self.filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }
        self.filled = 0;
        self.received += 1;
        Ok(CombinedFrame::from_wire(self.buf.clone()))
    }

    /// Set a read timeout for [`recv`](Self::recv). `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// The relay's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Size of each combined frame in bytes.
    pub fn frame_len(&self) -> usize {
        self.buf.len()
    }

    /// Frames received so far.
    pub fn frames_received(&self) -> u64 {
        self.received
    }
}
