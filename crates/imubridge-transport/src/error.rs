use std::net::SocketAddr;

/// Errors that can occur in sensor and relay transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial device.
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// Failed to apply settings to an open serial device.
    #[error("failed to configure serial device {path}: {source}")]
    Configure {
        path: String,
        source: serialport::Error,
    },

    /// Failed to enumerate serial devices.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// Failed to bind the relay listener.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on a sensor stream or socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
