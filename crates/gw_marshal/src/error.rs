use alloc::string::{String, ToString};
use core::fmt::Display;

use thiserror::Error;

use crate::class::FieldType;
use crate::model::ObjRef;
use crate::strategy::FilterPatternError;

/// Result alias used throughout the crate.
pub type Result<T, E = MarshalError> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// Corruption

/// The ways a byte stream can fail to follow the tag grammar.
///
/// Any of these leaves the stream position undefined, so the session that
/// observed it is unusable afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Corruption {
    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unexpected tag 0x{found:02x} while reading {context}")]
    UnexpectedTag { found: u8, context: &'static str },

    #[error("object handle {0} was never assigned")]
    UnknownHandle(u32),

    #[error("object handle {0} refers to an object still under construction")]
    UnboundHandle(u32),

    #[error("object handle {0} refers to an unshared object")]
    UnsharedHandle(u32),

    #[error("back reference to handle {0} cannot be read as unshared")]
    BackReferenceAsUnshared(u32),

    #[error("class handle {0} was never assigned")]
    UnknownClassHandle(u32),

    #[error("invalid type code 0x{0:02x}")]
    BadTypeCode(u8),

    #[error("varint does not fit in 64 bits")]
    VarintOverflow,

    #[error("length {0} exceeds the addressable range")]
    LengthOverflow(u64),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("0x{0:x} is not a valid char")]
    InvalidChar(u32),

    #[error("`{class}` has no enum constant `{constant}`")]
    UnknownEnumConstant { class: String, constant: String },

    #[error("stream header does not match")]
    BadHeader,

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
}

// -----------------------------------------------------------------------------
// ErrorCategory

/// Coarse classification of a [`MarshalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The stream does not follow the wire grammar.
    StreamCorruption,
    /// A class named in the stream could not be resolved or does not match.
    ClassResolution,
    /// The graph contains a value with no applicable encoding.
    NotSerializable,
    /// The unmarshalling filter rejected the input.
    FilterRejected,
    /// The underlying transport failed.
    Io,
    /// The API was used incorrectly, or a user strategy failed.
    Usage,
}

// -----------------------------------------------------------------------------
// MarshalError

/// Errors raised by marshalling and unmarshalling sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshalError {
    #[error("stream corrupted: {0}")]
    StreamCorrupted(#[from] Corruption),

    #[error("class `{name}` could not be resolved")]
    ClassNotFound { name: String },

    #[error("class `{name}` is incompatible: {reason}")]
    InvalidClass { name: String, reason: String },

    #[error("class `{class}` is not serializable")]
    NotSerializable { class: String },

    #[error("unmarshalling filter rejected {subject}")]
    FilterRejected { subject: String },

    #[error("primitive custom data precedes the requested object")]
    OptionalData,

    #[error("an object follows where primitive custom data was expected")]
    UnexpectedObject,

    #[error("read past the end of custom data")]
    EndOfCustomData,

    #[error("field `{field}` does not hold a {expected:?} value")]
    InvalidField { field: String, expected: FieldType },

    #[error("reference {0} does not point into the heap")]
    InvalidReference(ObjRef),

    #[error("no {0} is configured")]
    MissingStrategy(&'static str),

    #[error("session has not been started")]
    NotActive,

    #[error("session is already active")]
    AlreadyActive,

    #[error("session is unusable after an earlier failure")]
    Poisoned,

    #[error(transparent)]
    FilterPattern(#[from] FilterPatternError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl MarshalError {
    /// Creates a [`MarshalError::Custom`] from any displayable message.
    ///
    /// Intended for user strategies and hooks.
    #[inline]
    pub fn custom(msg: impl Display) -> Self {
        Self::Custom(msg.to_string())
    }

    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StreamCorrupted(_)
            | Self::OptionalData
            | Self::UnexpectedObject
            | Self::EndOfCustomData => ErrorCategory::StreamCorruption,
            Self::ClassNotFound { .. } | Self::InvalidClass { .. } => {
                ErrorCategory::ClassResolution
            }
            Self::NotSerializable { .. } => ErrorCategory::NotSerializable,
            Self::FilterRejected { .. } => ErrorCategory::FilterRejected,
            Self::Io(_) => ErrorCategory::Io,
            Self::InvalidField { .. }
            | Self::InvalidReference(_)
            | Self::MissingStrategy(_)
            | Self::NotActive
            | Self::AlreadyActive
            | Self::Poisoned
            | Self::FilterPattern(_)
            | Self::Custom(_) => ErrorCategory::Usage,
        }
    }

    /// Returns `true` if the error is a [`Corruption`] of the given kind.
    #[inline]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::StreamCorrupted(_))
    }

    #[cold]
    pub(crate) fn invalid_class(name: &str, reason: impl Display) -> Self {
        Self::InvalidClass {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
