use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::channel::ChannelId;
use crate::detector::{Frame, FrameConfig, FrameDetector};
use crate::error::{FrameError, Result};

/// `tokio_util` decoder yielding validated frames from an async byte stream.
///
/// Shares the detector state machine with [`FrameReader`](crate::FrameReader),
/// so resynchronization behaves identically.
#[derive(Debug)]
pub struct FrameCodec {
    detector: FrameDetector,
}

impl FrameCodec {
    /// Create a codec with the default frame layout.
    pub fn new(channel: ChannelId) -> Self {
        Self {
            detector: FrameDetector::new(channel),
        }
    }

    /// Create a codec with an explicit frame layout.
    pub fn with_config(channel: ChannelId, config: FrameConfig) -> Result<Self> {
        Ok(Self {
            detector: FrameDetector::with_config(channel, config)?,
        })
    }

    /// The detector driving this codec.
    pub fn detector(&self) -> &FrameDetector {
        &self.detector
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        Ok(self.detector.decode(src))
    }
}
