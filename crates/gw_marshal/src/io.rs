//! Primitive and object I/O traits.
//!
//! [`DataOutput`] and [`DataInput`] carry primitives in the wire encoding.
//! [`ObjectOutput`] and [`ObjectInput`] add whole values and are the
//! interfaces handed to hooks, externalizers and the object table.
//!
//! All traits are object safe. Sessions pass themselves as `&mut dyn ...`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::model::{Heap, Value};
use crate::{Corruption, Result};

/// Upper bound accepted for a single length prefix.
///
/// Guards allocations against corrupt or hostile length prefixes.
pub const MAX_LENGTH: usize = i32::MAX as usize;

/// Bytes of a length-prefixed payload read per step.
const READ_CHUNK: usize = 8192;

// -----------------------------------------------------------------------------
// DataOutput

/// A sink for primitive values.
pub trait DataOutput {
    fn write_u8(&mut self, v: u8) -> Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    #[inline]
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    #[inline]
    fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    #[inline]
    fn write_i16(&mut self, v: i16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Writes the scalar value as a big-endian `u32`.
    #[inline]
    fn write_char(&mut self, v: char) -> Result<()> {
        self.write_bytes(&u32::from(v).to_be_bytes())
    }

    #[inline]
    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    #[inline]
    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    /// Writes an unsigned LEB128 varint.
    fn write_varint(&mut self, mut v: u64) -> Result<()> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.write_bytes(&buf[..len])
    }

    /// Writes a varint byte length followed by UTF-8 data.
    #[inline]
    fn write_utf(&mut self, s: &str) -> Result<()> {
        self.write_varint(s.len() as u64)?;
        self.write_bytes(s.as_bytes())
    }
}

impl DataOutput for Vec<u8> {
    #[inline]
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.push(v);
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// DataInput

/// A source of primitive values.
pub trait DataInput {
    fn read_u8(&mut self) -> Result<u8>;

    /// Fills `buf` completely.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads a boolean. Any non-zero byte is `true`.
    #[inline]
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    #[inline]
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    #[inline]
    fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_into(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    fn read_char(&mut self) -> Result<char> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        let scalar = u32::from_be_bytes(buf);
        char::from_u32(scalar).ok_or_else(|| Corruption::InvalidChar(scalar).into())
    }

    #[inline]
    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    #[inline]
    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_into(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    #[inline]
    fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(f32::from_bits(u32::from_be_bytes(buf)))
    }

    #[inline]
    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_into(&mut buf)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    /// Reads an unsigned LEB128 varint.
    fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(Corruption::VarintOverflow.into());
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(Corruption::VarintOverflow.into());
            }
        }
    }

    /// Reads a varint length, rejecting anything above [`MAX_LENGTH`].
    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(len) if len <= MAX_LENGTH => Ok(len),
            _ => Err(Corruption::LengthOverflow(len).into()),
        }
    }

    /// Reads a varint handle.
    fn read_handle(&mut self) -> Result<u32> {
        let handle = self.read_varint()?;
        u32::try_from(handle).map_err(|_| Corruption::LengthOverflow(handle).into())
    }

    /// Reads a string written by [`DataOutput::write_utf`].
    ///
    /// The buffer grows as bytes arrive, so a corrupt length fails at the
    /// end of input instead of allocating up front.
    fn read_utf(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let mut buf = Vec::new();
        while buf.len() < len {
            let start = buf.len();
            buf.resize(len.min(start + READ_CHUNK), 0);
            self.read_into(&mut buf[start..])?;
        }
        String::from_utf8(buf).map_err(|_| Corruption::InvalidUtf8.into())
    }

    /// Discards `n` bytes.
    fn skip_bytes(&mut self, mut n: usize) -> Result<()> {
        let mut scratch = [0u8; 256];
        while n > 0 {
            let chunk = n.min(scratch.len());
            self.read_into(&mut scratch[..chunk])?;
            n -= chunk;
        }
        Ok(())
    }
}

impl DataInput for &[u8] {
    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.len() < buf.len() {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let (head, tail) = self.split_at(buf.len());
        buf.copy_from_slice(head);
        *self = tail;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Object I/O

/// A sink for whole values, backed by a marshalling session.
pub trait ObjectOutput: DataOutput {
    /// The heap the written graph lives in.
    fn heap(&self) -> &Heap;

    /// Writes a value, sharing it with earlier writes of the same object.
    fn write_object(&mut self, value: &Value) -> Result<()>;

    /// Writes a fresh copy of a value that later reads cannot refer back to.
    fn write_object_unshared(&mut self, value: &Value) -> Result<()>;
}

/// A source of whole values, backed by an unmarshalling session.
pub trait ObjectInput: DataInput {
    /// The heap that read objects are allocated in.
    fn heap(&self) -> &Heap;

    fn heap_mut(&mut self) -> &mut Heap;

    fn read_object(&mut self) -> Result<Value>;

    fn read_object_unshared(&mut self) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::{DataInput, DataOutput};
    use crate::{Corruption, MarshalError};

    #[test]
    fn varint_boundaries() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            buf.write_varint(v).unwrap();
            let mut input = &buf[..];
            assert_eq!(input.read_varint().unwrap(), v);
            assert!(input.is_empty());
        }

        let mut buf = Vec::new();
        buf.write_varint(127).unwrap();
        assert_eq!(buf, [0x7F]);
        buf.clear();
        buf.write_varint(128).unwrap();
        assert_eq!(buf, [0x80, 0x01]);
    }

    #[test]
    fn varint_overflow() {
        let bytes = [0xFFu8; 10];
        let mut input = &bytes[..];
        assert!(matches!(
            input.read_varint(),
            Err(MarshalError::StreamCorrupted(Corruption::VarintOverflow))
        ));
    }

    #[test]
    fn primitives_are_big_endian() {
        let mut buf = Vec::new();
        buf.write_i32(0x0102_0304).unwrap();
        buf.write_char('é').unwrap();
        buf.write_utf("hé").unwrap();
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0xE9]);

        let mut input = &buf[..];
        assert_eq!(input.read_i32().unwrap(), 0x0102_0304);
        assert_eq!(input.read_char().unwrap(), 'é');
        assert_eq!(input.read_utf().unwrap(), "hé");
    }

    #[test]
    fn invalid_text() {
        let surrogate = 0xD800u32.to_be_bytes();
        let mut input = &surrogate[..];
        assert!(input.read_char().is_err());

        let bad = [2u8, 0xC3, 0x28];
        let mut input = &bad[..];
        assert!(matches!(
            input.read_utf(),
            Err(MarshalError::StreamCorrupted(Corruption::InvalidUtf8))
        ));
    }
}
