use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::MarshalError;

/// The chain of classes a session is currently inside.
///
/// Pushed when an object body starts and popped when it ends. An error
/// skips the pops, so after a failure the stack still names the path to
/// the failing object. Only tracked when [`debug_enabled`](crate::debug_enabled).
#[derive(Default, Clone)]
pub(crate) struct ClassStack {
    stack: Vec<String>,
}

impl ClassStack {
    /// Create a new empty [`ClassStack`].
    pub const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, class_name: &str) {
        if crate::debug_enabled() {
            self.stack.push(class_name.into());
        }
    }

    #[inline]
    pub fn pop(&mut self) {
        if crate::debug_enabled() {
            self.stack.pop();
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Logs `err` together with the current stack, then clears it.
    pub fn report(&mut self, action: &str, err: &MarshalError) {
        if self.stack.is_empty() {
            log::debug!("{action} failed: {err}");
        } else {
            log::debug!("{action} failed: {err} (stack:\n{self:?})");
        }
        self.clear();
    }
}

impl Debug for ClassStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let mut iter = self.stack.iter();

        if let Some(first) = iter.next() {
            writeln!(f, "`{first}`")?;
        }

        for name in iter {
            writeln!(f, " -> `{name}`")?;
        }

        Ok(())
    }
}
