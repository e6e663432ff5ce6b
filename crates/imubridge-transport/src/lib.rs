//! Transport collaborators for the IMU bridge.
//!
//! Provides the two edges the bridge core talks to:
//! - Sensor byte streams: serial devices (with one-shot arming writes) or replayed captures
//! - The relay listener that accepts the single downstream TCP client
//!
//! This is the lowest layer of imubridge. Everything else builds on top of
//! the [`SensorStream`] and [`RelayListener`] types provided here.

pub mod error;
pub mod serial;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{available_ports, PortDescription, SerialDevice, SerialSettings};
pub use tcp::RelayListener;
pub use traits::SensorStream;
