use alloc::boxed::Box;
use std::io::{BufRead, BufReader, Read};

use crate::Result;
use crate::io::DataInput;

// -----------------------------------------------------------------------------
// ByteSource

/// Buffered input of an unmarshalling session.
pub(crate) struct ByteSource<'a> {
    inner: BufReader<Box<dyn Read + 'a>>,
    consumed: u64,
}

impl<'a> ByteSource<'a> {
    pub fn new(input: Box<dyn Read + 'a>, capacity: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity.max(16), input),
            consumed: 0,
        }
    }

    /// Total bytes consumed so far, header included.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Returns the next byte without consuming it, or `None` at end of input.
    pub fn peek_u8(&mut self) -> Result<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        Ok(buf.first().copied())
    }
}

impl DataInput for ByteSource<'_> {
    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.consumed += buf.len() as u64;
        Ok(())
    }
}
