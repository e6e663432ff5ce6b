use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

type BoxedReader = Box<dyn Read + Send>;
type BoxedWriter = Box<dyn Write + Send>;

/// An ordered sensor byte stream implementing `Read`.
///
/// This is the fundamental input type consumed by the frame layer.
/// A stream is either an open serial device or a replayed capture
/// (any `Read`, optionally paired with a `Write` that receives commands).
pub struct SensorStream {
    label: String,
    inner: SensorStreamInner,
}

enum SensorStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    Replay {
        reader: BoxedReader,
        commands: Option<BoxedWriter>,
    },
}

impl Read for SensorStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SensorStreamInner::Serial(port) => port.read(buf),
            SensorStreamInner::Replay { reader, .. } => reader.read(buf),
        }
    }
}

impl SensorStream {
    /// Wrap an open serial device.
    pub(crate) fn from_serial(
        label: impl Into<String>,
        port: Box<dyn serialport::SerialPort>,
    ) -> Self {
        Self {
            label: label.into(),
            inner: SensorStreamInner::Serial(port),
        }
    }

    /// Create a stream that replays bytes from any reader.
    ///
    /// Configuration commands written to a replay stream are discarded.
    pub fn from_reader(label: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            label: label.into(),
            inner: SensorStreamInner::Replay {
                reader: Box::new(reader),
                commands: None,
            },
        }
    }

    /// Create a replay stream whose configuration commands go to `commands`.
    pub fn from_parts(
        label: impl Into<String>,
        reader: impl Read + Send + 'static,
        commands: impl Write + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            inner: SensorStreamInner::Replay {
                reader: Box::new(reader),
                commands: Some(Box::new(commands)),
            },
        }
    }

    /// Human-readable source name (device path or replay label).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether this stream is backed by a serial device.
    pub fn is_serial(&self) -> bool {
        matches!(self.inner, SensorStreamInner::Serial(_))
    }

    /// Write one configuration command byte. No acknowledgement is awaited.
    pub fn write_command(&mut self, command: u8) -> Result<()> {
        let writer: &mut dyn Write = match &mut self.inner {
            SensorStreamInner::Serial(port) => port,
            SensorStreamInner::Replay {
                commands: Some(commands),
                ..
            } => commands,
            SensorStreamInner::Replay { commands: None, .. } => {
                debug!(source = %self.label, command, "replay stream ignores command");
                return Ok(());
            }
        };

        writer.write_all(&[command])?;
        writer.flush()?;
        Ok(())
    }

    /// Send each command of `sequence` once, in order.
    pub fn arm(&mut self, sequence: &[u8]) -> Result<()> {
        for &command in sequence {
            self.write_command(command)?;
        }
        info!(source = %self.label, commands = sequence.len(), "sensor armed");
        Ok(())
    }

    /// Set the read timeout of a serial device. Replay streams ignore this.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            SensorStreamInner::Serial(port) => {
                port.set_timeout(timeout)
                    .map_err(|source| TransportError::Configure {
                        path: self.label.clone(),
                        source,
                    })
            }
            SensorStreamInner::Replay { .. } => Ok(()),
        }
    }
}

impl std::fmt::Debug for SensorStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            SensorStreamInner::Serial(_) => "serial",
            SensorStreamInner::Replay { .. } => "replay",
        };
        f.debug_struct("SensorStream")
            .field("label", &self.label)
            .field("type", &kind)
            .finish()
    }
}
