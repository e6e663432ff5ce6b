use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use imubridge_transport::RelayListener;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::relay::RelayServer;

/// Listener behavior for the relay acceptor.
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Address to listen on. Port 0 picks an ephemeral port on first bind.
    pub addr: SocketAddr,
    /// Write timeout applied to each accepted client. `None` blocks forever.
    pub write_timeout: Option<Duration>,
    /// Delay before retrying a failed re-bind.
    pub rebind_backoff: Duration,
    /// How often waits re-check the shutdown flag.
    pub poll_interval: Duration,
}

impl AcceptorConfig {
    /// Default client write timeout.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
    /// Default delay between re-bind attempts.
    pub const DEFAULT_REBIND_BACKOFF: Duration = Duration::from_millis(250);

    /// Config for `addr` with default timings.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], RelayListener::DEFAULT_PORT)),
            write_timeout: Some(Self::DEFAULT_WRITE_TIMEOUT),
            rebind_backoff: Self::DEFAULT_REBIND_BACKOFF,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Accept loop feeding clients to a [`RelayServer`].
///
/// Only one client is served at a time. While a client is attached the
/// listener is closed; when the relay loses its client the acceptor binds a
/// fresh listener on the same address and waits for the next connection.
pub struct RelayAcceptor {
    config: AcceptorConfig,
    listener: Option<RelayListener>,
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

impl RelayAcceptor {
    /// Bind the initial listener.
    ///
    /// Failing here is fatal for the caller; later re-bind failures are
    /// retried inside [`run`](Self::run).
    pub fn bind(config: AcceptorConfig, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let listener = RelayListener::bind(config.addr)?;
        let addr = listener.local_addr();
        Ok(Self {
            config,
            listener: Some(listener),
            addr,
            shutdown,
        })
    }

    /// The resolved listen address (stable across re-binds).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve clients until shutdown is requested.
    pub fn run(mut self, relay: Arc<RelayServer>) {
        while !self.shutdown.load(Ordering::SeqCst) {
            if !self.ensure_listening() {
                break;
            }
            let Some(listener) = self.listener.as_ref() else {
                break;
            };

            let accepted = match listener.accept_until(&self.shutdown) {
                Ok(Some(accepted)) => accepted,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "accept failed, re-binding listener");
                    self.listener = None;
                    self.backoff();
                    continue;
                }
            };
            let (stream, peer) = accepted;

            if let Err(err) = stream.set_write_timeout(self.config.write_timeout) {
                warn!(%peer, error = %err, "failed to set client write timeout");
            }

            // One client at a time: stop listening while this one is served.
            self.listener = None;
            relay.attach(stream, peer.to_string());

            if !relay.wait_for_client_loss(&self.shutdown, self.config.poll_interval) {
                break;
            }
            info!(addr = %self.addr, "client lost, re-arming listener");
        }

        relay.disconnect();
        debug!(addr = %self.addr, "relay acceptor stopped");
    }

    /// Bind a new listener if none is open.
    ///
    /// Returns `false` only once shutdown is requested.
    fn ensure_listening(&mut self) -> bool {
        while self.listener.is_none() {
            if self.shutdown.load(Ordering::SeqCst) {
                return false;
            }
            match RelayListener::bind(self.addr) {
                Ok(listener) => self.listener = Some(listener),
                Err(err) => {
                    error!(addr = %self.addr, error = %err, "failed to re-bind relay listener");
                    self.backoff();
                }
            }
        }
        true
    }

    fn backoff(&self) {
        let mut remaining = self.config.rebind_backoff;
        while !remaining.is_zero() && !self.shutdown.load(Ordering::SeqCst) {
            let step = remaining.min(self.config.poll_interval);
            thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
    }
}
