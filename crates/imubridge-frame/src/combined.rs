use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::ChannelId;
use crate::detector::Frame;

/// One payload from each channel, channel 0 first.
///
/// Wire format sent downstream (no prefix, no markers, no checksum):
/// ```text
/// ┌──────────────────────┬──────────────────────┐
/// │ channel 0 payload    │ channel 1 payload    │
/// │ (payload_len bytes)  │ (payload_len bytes)  │
/// └──────────────────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedFrame {
    bytes: Bytes,
    split: usize,
    sequences: Option<[u64; 2]>,
}

impl CombinedFrame {
    /// Concatenate two channel frames. Argument order does not matter;
    /// the channel-0 payload always leads.
    pub fn combine(a: &Frame, b: &Frame) -> Self {
        debug_assert_ne!(a.channel, b.channel, "combined frames need both channels");
        let (zero, one) = if a.channel == ChannelId::Zero {
            (a, b)
        } else {
            (b, a)
        };

        let mut buf = BytesMut::with_capacity(zero.payload.len() + one.payload.len());
        buf.put_slice(&zero.payload);
        buf.put_slice(&one.payload);

        Self {
            bytes: buf.freeze(),
            split: zero.payload.len(),
            sequences: Some([zero.sequence, one.sequence]),
        }
    }

    /// Interpret bytes received from a relay. Both halves are the same size.
    pub fn from_wire(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let split = bytes.len() / 2;
        Self {
            bytes,
            split,
            sequences: None,
        }
    }

    /// The bytes written downstream.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the underlying buffer.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Total wire size.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when both payloads are empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The payload contributed by `channel`.
    pub fn part(&self, channel: ChannelId) -> &[u8] {
        match channel {
            ChannelId::Zero => &self.bytes[..self.split],
            ChannelId::One => &self.bytes[self.split..],
        }
    }

    /// Per-channel frame sequences, when built locally from detected frames.
    pub fn sequences(&self) -> Option<[u64; 2]> {
        self.sequences
    }
}

impl AsRef<[u8]> for CombinedFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
