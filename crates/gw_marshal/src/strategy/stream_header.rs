use alloc::vec::Vec;

use crate::io::{DataInput, DataOutput};
use crate::{Corruption, Result};

/// Bytes written before the version byte of every stream.
pub trait StreamHeader: Send + Sync {
    fn write_header(&self, output: &mut dyn DataOutput) -> Result<()>;

    /// Reads and validates the header. Mismatches fail with
    /// [`Corruption::BadHeader`].
    fn read_header(&self, input: &mut dyn DataInput) -> Result<()>;
}

/// A fixed byte sequence.
///
/// # Examples
///
/// ```
/// use gw_marshal::strategy::{MagicHeader, StreamHeader};
///
/// let header = MagicHeader::new(*b"GW");
/// let mut out = Vec::new();
/// header.write_header(&mut out).unwrap();
///
/// let mut input = &out[..];
/// assert!(header.read_header(&mut input).is_ok());
///
/// let mut wrong: &[u8] = b"XX";
/// assert!(header.read_header(&mut wrong).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicHeader {
    magic: Vec<u8>,
}

impl MagicHeader {
    pub fn new(magic: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: magic.into(),
        }
    }
}

impl StreamHeader for MagicHeader {
    fn write_header(&self, output: &mut dyn DataOutput) -> Result<()> {
        output.write_bytes(&self.magic)
    }

    fn read_header(&self, input: &mut dyn DataInput) -> Result<()> {
        let mut found = alloc::vec![0u8; self.magic.len()];
        input.read_into(&mut found)?;
        if found == self.magic {
            Ok(())
        } else {
            Err(Corruption::BadHeader.into())
        }
    }
}
