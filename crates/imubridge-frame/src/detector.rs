use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::channel::{ChannelId, DEFAULT_HEADER, DEFAULT_PAYLOAD_LEN, DEFAULT_TRAILER};
use crate::error::{FrameError, Result};

/// A validated sensor frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel that produced this frame.
    pub channel: ChannelId,
    /// Position of this frame among its channel's emissions, starting at 1.
    pub sequence: u64,
    /// The payload between header and trailer.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame outside of a detector (sequence 0).
    pub fn new(channel: ChannelId, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            sequence: 0,
            payload: payload.into(),
        }
    }

    /// The size of this frame on the sensor wire (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        self.payload.len() + 2
    }
}

/// Wire layout of a sensor frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Header sentinel. Default: `'A'`.
    pub header: u8,
    /// Trailer sentinel. Default: `'Z'`.
    pub trailer: u8,
    /// Payload size in bytes. Default: 20.
    pub payload_len: usize,
    /// Read timeout applied to serial sources.
    pub read_timeout: Option<Duration>,
}

impl FrameConfig {
    /// Reject layouts that could never produce a frame.
    pub fn validate(&self) -> Result<()> {
        if self.payload_len == 0 {
            return Err(FrameError::InvalidConfig(
                "payload length must be at least one byte".to_string(),
            ));
        }
        Ok(())
    }

    /// Size of a combined frame built from one payload per channel.
    pub fn combined_len(&self) -> usize {
        self.payload_len * crate::channel::CHANNEL_COUNT
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER,
            trailer: DEFAULT_TRAILER,
            payload_len: DEFAULT_PAYLOAD_LEN,
            read_timeout: Some(Duration::from_millis(100)),
        }
    }
}

/// Where the detector is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Discarding bytes until a header sentinel.
    SeekHeader,
    /// Collecting payload bytes verbatim.
    ReadPayload,
    /// Waiting for the byte that must be the trailer.
    CheckTrailer,
}

/// Counters kept by a detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorStats {
    /// Frames emitted.
    pub frames: u64,
    /// Bytes skipped while seeking a header.
    pub skipped_bytes: u64,
    /// Candidate frames dropped because the trailer did not match.
    pub trailer_mismatches: u64,
}

/// Incremental header/payload/trailer detector for one channel.
///
/// Bytes may arrive in chunks of any size; a frame split across chunks is
/// completed when the remaining bytes arrive. A trailer mismatch drops the
/// candidate frame and the mismatched byte; scanning resumes with the next
/// byte, never re-reading consumed payload bytes.
#[derive(Debug)]
pub struct FrameDetector {
    channel: ChannelId,
    config: FrameConfig,
    state: DetectorState,
    payload: BytesMut,
    stats: DetectorStats,
}

impl FrameDetector {
    /// Create a detector with the default frame layout.
    pub fn new(channel: ChannelId) -> Self {
        Self::build(channel, FrameConfig::default())
    }

    /// Create a detector with an explicit frame layout.
    pub fn with_config(channel: ChannelId, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(channel, config))
    }

    fn build(channel: ChannelId, config: FrameConfig) -> Self {
        Self {
            channel,
            payload: BytesMut::with_capacity(config.payload_len),
            config,
            state: DetectorState::SeekHeader,
            stats: DetectorStats::default(),
        }
    }

    /// Advance the detector by one byte.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            DetectorState::SeekHeader => {
                if byte == self.config.header {
                    self.payload.clear();
                    self.state = DetectorState::ReadPayload;
                } else {
                    self.stats.skipped_bytes += 1;
                }
                None
            }
            DetectorState::ReadPayload => {
                self.payload.extend_from_slice(&[byte]);
                if self.payload.len() == self.config.payload_len {
                    self.state = DetectorState::CheckTrailer;
                }
                None
            }
            DetectorState::CheckTrailer => {
                self.state = DetectorState::SeekHeader;
                self.finish(byte)
            }
        }
    }

    /// Consume bytes from `src` until a frame completes.
    ///
    /// Returns `None` once `src` is exhausted without a complete frame; the
    /// partial state is kept for the next call. On success, bytes after the
    /// trailer are left in `src`.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Frame> {
        while !src.is_empty() {
            match self.state {
                DetectorState::SeekHeader => {
                    match src.iter().position(|&b| b == self.config.header) {
                        Some(pos) => {
                            self.stats.skipped_bytes += pos as u64;
                            src.advance(pos + 1);
                            self.payload.clear();
                            self.state = DetectorState::ReadPayload;
                        }
                        None => {
                            self.stats.skipped_bytes += src.len() as u64;
                            src.clear();
                        }
                    }
                }
                DetectorState::ReadPayload => {
                    let wanted = self.config.payload_len - self.payload.len();
                    let take = wanted.min(src.len());
                    self.payload.extend_from_slice(&src[..take]);
                    src.advance(take);
                    if self.payload.len() == self.config.payload_len {
                        self.state = DetectorState::CheckTrailer;
                    }
                }
                DetectorState::CheckTrailer => {
                    let byte = src[0];
                    src.advance(1);
                    self.state = DetectorState::SeekHeader;
                    if let Some(frame) = self.finish(byte) {
                        return Some(frame);
                    }
                }
            }
        }
        None
    }

    /// Run every byte of `bytes` through the detector, collecting frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut src = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(&mut src) {
            frames.push(frame);
        }
        frames
    }

    fn finish(&mut self, byte: u8) -> Option<Frame> {
        if byte != self.config.trailer {
            self.stats.trailer_mismatches += 1;
            self.payload.clear();
            debug!(
                channel = %self.channel,
                found = byte,
                expected = self.config.trailer,
                "trailer mismatch, frame dropped"
            );
            return None;
        }

        self.stats.frames += 1;
        let frame = Frame {
            channel: self.channel,
            sequence: self.stats.frames,
            payload: self.payload.split().freeze(),
        };
        trace!(channel = %self.channel, sequence = frame.sequence, "frame detected");
        Some(frame)
    }

    /// The channel this detector serves.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Current position within a frame.
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Detector counters.
    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    /// Frame layout in use.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
