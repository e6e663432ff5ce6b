/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] imubridge_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] imubridge_frame::FrameError),

    /// Socket I/O error.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The relay connection went away.
    #[error("relay disconnected: {0}")]
    Disconnected(String),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
}

impl RelayError {
    /// True when a read gave up waiting; the operation can be retried.
    pub fn is_timeout(&self) -> bool {
        match self {
            RelayError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            RelayError::Frame(err) => err.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
