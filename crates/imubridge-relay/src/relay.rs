use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use imubridge_frame::{CombinedFrame, CombinedWriter};
use tracing::{error, info, trace, warn};

/// Observable relay connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable client; combined frames are dropped.
    AwaitingClient,
    /// A client is attached and receives every combined frame.
    Connected,
}

/// Relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Combined frames written in full to a client.
    pub delivered: u64,
    /// Combined frames dropped because no client was attached or the writer
    /// was still busy with an earlier frame.
    pub dropped: u64,
    /// Sends that failed and ended a connection.
    pub send_failures: u64,
    /// Clients attached over the relay's lifetime.
    pub clients: u64,
}

enum Connection<W> {
    AwaitingClient,
    Connected {
        writer: CombinedWriter<W>,
        peer: String,
    },
}

impl<W> Connection<W> {
    fn state(&self) -> ConnectionState {
        match self {
            Connection::AwaitingClient => ConnectionState::AwaitingClient,
            Connection::Connected { .. } => ConnectionState::Connected,
        }
    }
}

/// Owner of the single downstream connection slot.
///
/// `send` never fails from the caller's point of view: a write error closes
/// the connection and drops the relay back to
/// [`ConnectionState::AwaitingClient`], waking whoever re-arms the listener.
/// Frames are never queued or replayed. `send` blocks on the client socket,
/// so producers reach it through a [`RelayDispatcher`](crate::RelayDispatcher).
pub struct RelayServer<W = TcpStream> {
    connection: Mutex<Connection<W>>,
    changed: Condvar,
    delivered: AtomicU64,
    dropped: AtomicU64,
    send_failures: AtomicU64,
    clients: AtomicU64,
}

impl<W: Write + Send> RelayServer<W> {
    /// Create a relay awaiting its first client.
    pub fn new() -> Self {
        Self {
            connection: Mutex::new(Connection::AwaitingClient),
            changed: Condvar::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            clients: AtomicU64::new(0),
        }
    }

    /// Make `writer` the active client (`AwaitingClient → Connected`).
    ///
    /// A connection that is somehow still attached is replaced, not flushed.
    pub fn attach(&self, writer: W, peer: impl Into<String>) {
        let peer = peer.into();
        let mut connection = self.lock();
        if let Connection::Connected { peer: previous, .. } = &*connection {
            warn!(%previous, "replacing attached client without clean close");
        }
        info!(%peer, "client connected");
        *connection = Connection::Connected {
            writer: CombinedWriter::new(writer),
            peer,
        };
        self.clients.fetch_add(1, Ordering::Relaxed);
        drop(connection);
        self.changed.notify_all();
    }

    /// Deliver a combined frame to the attached client, if any.
    pub fn send(&self, frame: &CombinedFrame) {
        let mut connection = self.lock();
        let result = match &mut *connection {
            Connection::AwaitingClient => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("no client attached, combined frame dropped");
                return;
            }
            Connection::Connected { writer, .. } => writer.write_combined(frame),
        };

        match result {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                if let Connection::Connected { peer, .. } = &*connection {
                    error!(%peer, error = %err, "send failed, closing client connection");
                }
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                *connection = Connection::AwaitingClient;
                drop(connection);
                self.changed.notify_all();
            }
        }
    }

    pub(crate) fn note_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop the attached client, if any (`Connected → AwaitingClient`).
    pub fn disconnect(&self) {
        let mut connection = self.lock();
        if let Connection::Connected { peer, .. } = &*connection {
            info!(%peer, "closing client connection");
        }
        *connection = Connection::AwaitingClient;
        drop(connection);
        self.changed.notify_all();
    }

    /// Block until no client is attached.
    ///
    /// Returns `false` if `shutdown` was set first. The flag is re-checked
    /// every `poll` interval.
    pub fn wait_for_client_loss(&self, shutdown: &AtomicBool, poll: Duration) -> bool {
        let mut connection = self.lock();
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return false;
            }
            if matches!(*connection, Connection::AwaitingClient) {
                return true;
            }
            connection = self
                .changed
                .wait_timeout(connection, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    /// Address (or label) of the attached client.
    pub fn peer(&self) -> Option<String> {
        match &*self.lock() {
            Connection::AwaitingClient => None,
            Connection::Connected { peer, .. } => Some(peer.clone()),
        }
    }

    /// Relay counters.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            clients: self.clients.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection<W>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Default for RelayServer<W> {
    fn default() -> Self {
        Self::new()
    }
}
