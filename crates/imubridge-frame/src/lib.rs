//! Frame detection and combination for dual IMU sensor streams.
//!
//! This is the core value-add layer of imubridge. Every sensor frame on the
//! wire looks like:
//! - A 1-byte header sentinel (`'A'`)
//! - A fixed-size payload (20 bytes)
//! - A 1-byte trailer sentinel (`'Z'`)
//!
//! The detector resynchronizes silently after noise or a bad trailer. Callers
//! only ever see complete, byte-exact payloads.

pub mod channel;
#[cfg(feature = "async")]
pub mod codec;
pub mod combined;
pub mod detector;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{
    ChannelId, ARM_SEQUENCE, CHANNEL_COUNT, DEFAULT_HEADER, DEFAULT_PAYLOAD_LEN, DEFAULT_TRAILER,
};
#[cfg(feature = "async")]
pub use codec::FrameCodec;
pub use combined::CombinedFrame;
pub use detector::{DetectorState, DetectorStats, Frame, FrameConfig, FrameDetector};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, Frames};
pub use writer::CombinedWriter;
