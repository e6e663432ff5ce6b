//! Channel identities and sensor protocol constants.

use std::fmt;

/// Number of input channels bridged.
pub const CHANNEL_COUNT: usize = 2;

/// Frame header sentinel (`'A'`).
pub const DEFAULT_HEADER: u8 = 0x41;

/// Frame trailer sentinel (`'Z'`).
pub const DEFAULT_TRAILER: u8 = 0x5A;

/// Payload bytes between header and trailer.
pub const DEFAULT_PAYLOAD_LEN: usize = 20;

/// Commands that arm a sensor board, sent once in this order:
/// `%` selects the 1.5 g range, `)` sets 50 Hz output, `#` starts binary
/// output with all channels active.
pub const ARM_SEQUENCE: [u8; 3] = [b'%', b')', b'#'];

/// Identity of an input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    /// First sensor; its payload leads every combined frame.
    Zero,
    /// Second sensor.
    One,
}

impl ChannelId {
    /// Both channels, in combined-frame order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::Zero, ChannelId::One];

    /// Position of this channel in slot arrays and combined frames.
    pub fn index(self) -> usize {
        match self {
            ChannelId::Zero => 0,
            ChannelId::One => 1,
        }
    }

    /// Channel for a slot index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChannelId::Zero),
            1 => Some(ChannelId::One),
            _ => None,
        }
    }

    /// The other channel.
    pub fn other(self) -> Self {
        match self {
            ChannelId::Zero => ChannelId::One,
            ChannelId::One => ChannelId::Zero,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imu{}", self.index())
    }
}
