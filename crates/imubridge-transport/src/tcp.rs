use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// TCP listener for the downstream relay client.
///
/// The listener is non-blocking internally so an accept can be abandoned
/// when the owner shuts down. Dropping the listener closes the socket, which
/// resets any client still waiting in the backlog.
pub struct RelayListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl RelayListener {
    /// Port the downstream client connects to by default.
    pub const DEFAULT_PORT: u16 = 19028;
    /// How often a pending accept re-checks for a connection or shutdown.
    pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

    /// Bind and listen on `addr`.
    ///
    /// Binding port 0 picks an ephemeral port; [`local_addr`](Self::local_addr)
    /// reports the resolved address.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%addr, "listening for relay client");
        Ok(Self { listener, addr })
    }

    /// Accept the next client (blocking).
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let never = AtomicBool::new(false);
        self.accept_until(&never)?.ok_or(TransportError::Shutdown)
    }

    /// Accept the next client, giving up once `shutdown` is set.
    ///
    /// Returns `Ok(None)` when shut down before a client arrived.
    pub fn accept_until(&self, shutdown: &AtomicBool) -> Result<Option<(TcpStream, SocketAddr)>> {
        while !shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false).map_err(TransportError::Accept)?;
                    stream.set_nodelay(true).map_err(TransportError::Accept)?;
                    debug!(%peer, "accepted connection");
                    return Ok(Some((stream, peer)));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Self::ACCEPT_POLL_INTERVAL);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
        Ok(None)
    }

    /// The resolved address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for RelayListener {
    fn drop(&mut self) {
        debug!(addr = %self.addr, "closing relay listener");
    }
}
