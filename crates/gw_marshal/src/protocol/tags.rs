//! One-byte tags of the wire grammar.
//!
//! Every value in the stream starts with one of the object tags. Class
//! descriptors start with one of the class tags. The framing tags delimit
//! custom data and reset the handle tables.

// -----------------------------------------------------------------------------
// Object tags

pub const NULL: u8 = 0x01;
/// Followed by a varint instance handle.
pub const REPEAT_OBJECT: u8 = 0x02;
/// Followed by the object table payload. Assigns no handle.
pub const PREDEFINED_OBJECT: u8 = 0x03;
/// Followed by a class descriptor and the instance body.
pub const NEW_OBJECT: u8 = 0x04;
/// Prefix: the next new object must not be referenced again.
pub const UNSHARED: u8 = 0x05;
/// Followed by a proxy class descriptor and the handler value.
pub const PROXY_OBJECT: u8 = 0x06;
/// Followed by a class descriptor. Writes a class as a value.
pub const CLASS_OBJECT: u8 = 0x07;
/// Followed by a varint byte length and UTF-8 data.
pub const STRING: u8 = 0x08;
/// Followed by a varint length and the elements.
pub const LIST: u8 = 0x09;
/// Followed by a varint length and the key/value pairs.
pub const MAP: u8 = 0x0A;

// -----------------------------------------------------------------------------
// Boxed primitives

pub const BOOLEAN_FALSE: u8 = 0x10;
pub const BOOLEAN_TRUE: u8 = 0x11;
pub const BYTE: u8 = 0x12;
pub const CHAR: u8 = 0x13;
pub const SHORT: u8 = 0x14;
pub const INT: u8 = 0x15;
pub const LONG: u8 = 0x16;
pub const FLOAT: u8 = 0x17;
pub const DOUBLE: u8 = 0x18;

// -----------------------------------------------------------------------------
// Class tags

/// Ends a superclass chain.
pub const NO_CLASS_DESC: u8 = 0x20;
/// Followed by a varint class handle.
pub const REPEAT_CLASS: u8 = 0x21;
/// Followed by the class table payload.
pub const PREDEFINED_CLASS: u8 = 0x22;
/// Name and annotation only.
pub const PLAIN_CLASS: u8 = 0x23;
/// Name, UID, flags, fields, annotation and superclass descriptor.
pub const SERIALIZABLE_CLASS: u8 = 0x24;
/// Like [`SERIALIZABLE_CLASS`] with components instead of fields.
pub const RECORD_CLASS: u8 = 0x25;
/// Name, UID and annotation.
pub const EXTERNALIZABLE_CLASS: u8 = 0x26;
/// Inner class descriptor, externalizer id and externalizer state.
pub const EXTERNALIZER_CLASS: u8 = 0x27;
/// Name and annotation.
pub const ENUM_CLASS: u8 = 0x28;
/// Element type code.
pub const ARRAY_CLASS: u8 = 0x29;
/// Interface names and annotation.
pub const PROXY_CLASS: u8 = 0x2A;

// -----------------------------------------------------------------------------
// Framing tags

/// Followed by a varint length and that many bytes of custom data.
pub const START_BLOCK: u8 = 0x30;
/// Ends the custom data of one hook invocation.
pub const END_BLOCK_DATA: u8 = 0x31;
/// Resets the instance handle table.
pub const CLEAR_INSTANCE_CACHE: u8 = 0x32;
/// Resets both the class and the instance handle tables.
pub const CLEAR_CLASS_CACHE: u8 = 0x33;

// -----------------------------------------------------------------------------
// Descriptor flags

/// The writer ran a custom write hook, so custom data follows the fields.
pub const FLAG_HOOK_DATA: u8 = 0x01;
pub const FLAG_WRITE_REPLACE: u8 = 0x02;
pub const FLAG_READ_RESOLVE: u8 = 0x04;

/// Returns a readable name for `tag`, for diagnostics.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        NULL => "NULL",
        REPEAT_OBJECT => "REPEAT_OBJECT",
        PREDEFINED_OBJECT => "PREDEFINED_OBJECT",
        NEW_OBJECT => "NEW_OBJECT",
        UNSHARED => "UNSHARED",
        PROXY_OBJECT => "PROXY_OBJECT",
        CLASS_OBJECT => "CLASS_OBJECT",
        STRING => "STRING",
        LIST => "LIST",
        MAP => "MAP",
        BOOLEAN_FALSE => "BOOLEAN_FALSE",
        BOOLEAN_TRUE => "BOOLEAN_TRUE",
        BYTE => "BYTE",
        CHAR => "CHAR",
        SHORT => "SHORT",
        INT => "INT",
        LONG => "LONG",
        FLOAT => "FLOAT",
        DOUBLE => "DOUBLE",
        NO_CLASS_DESC => "NO_CLASS_DESC",
        REPEAT_CLASS => "REPEAT_CLASS",
        PREDEFINED_CLASS => "PREDEFINED_CLASS",
        PLAIN_CLASS => "PLAIN_CLASS",
        SERIALIZABLE_CLASS => "SERIALIZABLE_CLASS",
        RECORD_CLASS => "RECORD_CLASS",
        EXTERNALIZABLE_CLASS => "EXTERNALIZABLE_CLASS",
        EXTERNALIZER_CLASS => "EXTERNALIZER_CLASS",
        ENUM_CLASS => "ENUM_CLASS",
        ARRAY_CLASS => "ARRAY_CLASS",
        PROXY_CLASS => "PROXY_CLASS",
        START_BLOCK => "START_BLOCK",
        END_BLOCK_DATA => "END_BLOCK_DATA",
        CLEAR_INSTANCE_CACHE => "CLEAR_INSTANCE_CACHE",
        CLEAR_CLASS_CACHE => "CLEAR_CLASS_CACHE",
        _ => "UNKNOWN",
    }
}
