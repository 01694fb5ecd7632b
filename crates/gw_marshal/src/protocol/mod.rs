//! The wire format.
//!
//! A stream is an optional header, one version byte, then any sequence of
//! top-level values and primitives. Integers are big-endian, lengths are
//! LEB128 varints, strings are a varint byte length followed by UTF-8.

// -----------------------------------------------------------------------------
// Modules

mod sink;
mod source;

pub mod tags;

// -----------------------------------------------------------------------------
// Exports

pub(crate) use sink::ByteSink;
pub(crate) use source::ByteSource;

/// The newest protocol version this crate writes and reads.
pub const PROTOCOL_VERSION: u8 = 1;

/// The oldest protocol version this crate reads.
pub const MIN_PROTOCOL_VERSION: u8 = 1;

/// Default capacity of the buffered sink and source.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Pending custom data is framed into a block once it reaches this size.
pub const MAX_BLOCK_SIZE: usize = 1024;
