use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use imubridge_transport::SensorStream;

use crate::channel::ChannelId;
use crate::detector::{Frame, FrameConfig, FrameDetector};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Reads validated frames from any `Read` byte stream.
///
/// Handles partial reads and resynchronization internally; callers always
/// get complete payloads, in stream order.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    detector: FrameDetector,
}

impl<T: Read> FrameReader<T> {
    /// Create a frame reader with the default frame layout.
    pub fn new(inner: T, channel: ChannelId) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            detector: FrameDetector::new(channel),
        }
    }

    /// Create a frame reader with an explicit frame layout.
    pub fn with_config(inner: T, channel: ChannelId, config: FrameConfig) -> Result<Self> {
        Ok(Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            detector: FrameDetector::with_config(channel, config)?,
        })
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends. A
    /// frame cut short by the end of the stream is never returned.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.detector.decode(&mut self.buf) {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Iterate over frames until the stream ends.
    ///
    /// The iterator yields `Err` for I/O failures (including read timeouts,
    /// after which iteration may continue) and stops at end of stream.
    pub fn frames(&mut self) -> Frames<'_, T> {
        Frames { reader: self }
    }

    /// The detector driving this reader.
    pub fn detector(&self) -> &FrameDetector {
        &self.detector
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameReader<SensorStream> {
    /// Create a frame reader for a sensor stream and apply the read timeout from config.
    pub fn for_sensor(
        mut inner: SensorStream,
        channel: ChannelId,
        config: FrameConfig,
    ) -> Result<Self> {
        if let Some(timeout) = config.read_timeout {
            inner
                .set_read_timeout(timeout)
                .map_err(transport_to_frame_error)?;
        }
        Self::with_config(inner, channel, config)
    }
}

/// Lazy sequence of frames from a [`FrameReader`].
pub struct Frames<'a, T> {
    reader: &'a mut FrameReader<T>,
}

impl<T: Read> Iterator for Frames<'_, T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

fn transport_to_frame_error(err: imubridge_transport::TransportError) -> FrameError {
    match err {
        imubridge_transport::TransportError::Io(io)
        | imubridge_transport::TransportError::Accept(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
