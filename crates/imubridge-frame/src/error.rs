/// Errors that can occur while reading sensor frames or writing combined frames.
///
/// Framing problems (noise, bad trailers) are not errors; the detector drops
/// them silently.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame configuration cannot describe a valid frame.
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended (or the peer closed the connection).
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True when a read gave up waiting for bytes.
    ///
    /// Serial devices report idle lines this way; the read can be retried.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Io(err) if err.kind() == std::io::ErrorKind::TimedOut)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
