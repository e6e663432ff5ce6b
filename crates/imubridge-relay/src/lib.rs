//! Frame synchronization and downstream relay for the IMU bridge.
//!
//! This is the "just works" layer. Point it at two sensor streams and a TCP
//! address; it pairs the channels' frames and forwards each pair to the one
//! connected client, re-arming the listener whenever that client goes away.

pub mod acceptor;
pub mod bridge;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod relay;
pub mod synchronizer;

pub use acceptor::{AcceptorConfig, RelayAcceptor};
pub use bridge::{Bridge, BridgeConfig, ChannelSource, ShutdownHandle};
pub use client::RelayClient;
pub use dispatch::{RelayDispatcher, RelayWriter, OUTBOX_CAPACITY};
pub use error::{RelayError, Result};
pub use relay::{ConnectionState, RelayServer, RelayStats};
pub use synchronizer::{FrameSink, FrameSynchronizer, PendingSlot, SlotPolicy, SyncStats};
