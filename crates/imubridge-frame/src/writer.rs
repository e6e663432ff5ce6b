use std::io::{ErrorKind, Write};

use crate::combined::CombinedFrame;
use crate::error::{FrameError, Result};

/// Writes combined frames, raw and unprefixed, to any `Write` stream.
pub struct CombinedWriter<T> {
    inner: T,
    written: u64,
}

impl<T: Write> CombinedWriter<T> {
    /// Create a new combined-frame writer.
    pub fn new(inner: T) -> Self {
        Self { inner, written: 0 }
    }

    /// Write one combined frame in full and flush (blocking).
    ///
    /// A write that times out counts as a failure: a stalled client must not
    /// hold up the sensors.
    pub fn write_combined(&mut self, frame: &CombinedFrame) -> Result<()> {
        let bytes = frame.as_bytes();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Frames written in full so far.
    pub fn frames_written(&self) -> u64 {
        self.written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
