use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use imubridge_frame::CombinedFrame;
use tracing::{debug, trace};

use crate::relay::RelayServer;
use crate::synchronizer::FrameSink;

/// Combined frames that may wait while the writer is busy with another.
pub const OUTBOX_CAPACITY: usize = 1;

/// Non-blocking [`FrameSink`] in front of a [`RelayServer`].
///
/// Frames are handed through a bounded outbox to a [`RelayWriter`] running on
/// its own thread. A full outbox drops the frame and counts it in
/// [`RelayStats::dropped`](crate::RelayStats::dropped); the producing sensor
/// thread never waits on the client socket.
pub struct RelayDispatcher<W = TcpStream> {
    relay: Arc<RelayServer<W>>,
    outbox: SyncSender<CombinedFrame>,
}

impl<W: Write + Send> RelayDispatcher<W> {
    /// Create a dispatcher and the writer that drains it.
    pub fn new(relay: Arc<RelayServer<W>>) -> (Self, RelayWriter<W>) {
        let (outbox, inbox) = mpsc::sync_channel(OUTBOX_CAPACITY);
        let dispatcher = Self {
            relay: Arc::clone(&relay),
            outbox,
        };
        (dispatcher, RelayWriter { relay, inbox })
    }

    /// The relay frames are written to.
    pub fn relay(&self) -> &Arc<RelayServer<W>> {
        &self.relay
    }
}

impl<W: Write + Send> FrameSink for RelayDispatcher<W> {
    fn deliver(&self, frame: CombinedFrame) {
        match self.outbox.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.relay.note_dropped();
                trace!("relay writer busy, combined frame dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.relay.note_dropped();
                trace!("relay writer gone, combined frame dropped");
            }
        }
    }
}

/// The consuming half of a [`RelayDispatcher`]. Owns all client writes.
pub struct RelayWriter<W = TcpStream> {
    relay: Arc<RelayServer<W>>,
    inbox: Receiver<CombinedFrame>,
}

impl<W: Write + Send> RelayWriter<W> {
    /// Write queued frames until shutdown is requested or the dispatcher is
    /// dropped. Frames already queued are written before stopping.
    pub fn run(self, shutdown: &AtomicBool, poll: Duration) {
        let mut forwarded = 0u64;
        loop {
            match self.inbox.recv_timeout(poll) {
                Ok(frame) => {
                    self.relay.send(&frame);
                    forwarded += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(frames = forwarded, "relay writer stopped");
    }
}
