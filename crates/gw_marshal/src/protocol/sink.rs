use alloc::boxed::Box;
use std::io::{BufWriter, Write};

use crate::Result;
use crate::io::DataOutput;

// -----------------------------------------------------------------------------
// ByteSink

/// Buffered output of a marshalling session.
pub(crate) struct ByteSink<'a> {
    inner: BufWriter<Box<dyn Write + 'a>>,
    written: u64,
}

impl<'a> ByteSink<'a> {
    pub fn new(output: Box<dyn Write + 'a>, capacity: usize) -> Self {
        Self {
            inner: BufWriter::with_capacity(capacity.max(1), output),
            written: 0,
        }
    }

    /// Total bytes accepted so far, header included.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Releases the output, dropping whatever is still buffered.
    pub fn discard(self) {
        let (_output, buffered) = self.inner.into_parts();
        if let Ok(buffered) = buffered {
            log::trace!("discarded {} buffered bytes", buffered.len());
        }
    }
}

impl DataOutput for ByteSink<'_> {
    #[inline]
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}
