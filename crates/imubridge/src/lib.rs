//! Dual IMU serial bridge.
//!
//! imubridge reads two sensor byte streams, extracts header/trailer framed
//! payloads from each, pairs the latest frame of both channels into one
//! combined record and forwards it to a single downstream TCP client.
//!
//! # Crate Structure
//!
//! - [`transport`]: sensor byte streams (serial, replay) and the relay listener
//! - [`frame`]: frame detection, combined frames and their readers/writers
//! - [`relay`]: channel pairing, the relay state machine and the running bridge

/// Re-export transport types.
pub mod transport {
    pub use imubridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use imubridge_frame::*;
}

/// Re-export relay and bridge types.
pub mod relay {
    pub use imubridge_relay::*;
}
