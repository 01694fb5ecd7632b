use crate::{MarshalError, Result};

/// Lifecycle of a marshaller or unmarshaller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    /// Not started, or finished.
    Idle,
    Active,
    /// Failed. Only `start` and `finish` are accepted.
    Poisoned,
}

impl SessionState {
    #[inline]
    pub fn ensure_active(self) -> Result<()> {
        match self {
            Self::Active => Ok(()),
            Self::Idle => Err(MarshalError::NotActive),
            Self::Poisoned => Err(MarshalError::Poisoned),
        }
    }
}
