//! Handle tables of both session sides.
//!
//! Handles are dense `u32` counters starting at zero. Instances and classes
//! use separate counters. Writer and reader must assign handles in exactly
//! the same order for back references to resolve.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use gw_utils::IdentityMap;

use crate::class::ClassRef;
use crate::descriptor::StreamClass;
use crate::model::{ObjRef, Value};
use crate::strategy::Externalizer;
use crate::{Corruption, Result};

// -----------------------------------------------------------------------------
// InstanceHandles

/// Write-side table from object identity to instance handle.
#[derive(Debug, Default)]
pub(crate) struct InstanceHandles {
    handles: IdentityMap<u32>,
    next: u32,
}

impl InstanceHandles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handles: IdentityMap::with_capacity(capacity),
            next: 0,
        }
    }

    #[inline]
    pub fn lookup(&self, obj: ObjRef) -> Option<u32> {
        self.handles.get(obj.index()).copied()
    }

    /// Assigns the next handle to `obj`.
    #[inline]
    pub fn assign(&mut self, obj: ObjRef) -> u32 {
        let handle = self.skip();
        self.handles.insert(obj.index(), handle);
        handle
    }

    /// Makes `obj` resolve to an existing handle, used when a substitute
    /// was written in its place.
    #[inline]
    pub fn alias(&mut self, obj: ObjRef, handle: u32) {
        self.handles.insert(obj.index(), handle);
    }

    /// Consumes a handle without recording any object, for unshared writes.
    #[inline]
    pub fn skip(&mut self) -> u32 {
        let handle = self.next;
        self.next += 1;
        handle
    }

    /// Number of handles handed out.
    #[inline]
    pub fn count(&self) -> u32 {
        self.next
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.next = 0;
    }
}

// -----------------------------------------------------------------------------
// ClassHandles

/// Write-side table from class identity to class handle.
///
/// A class written under an externalizer gets its own handle, distinct
/// from the handle of its plain descriptor. The externalizer chosen for the
/// first instance is kept and used for every later instance of the class.
#[derive(Default)]
pub(crate) struct ClassHandles {
    plain: IdentityMap<(ClassRef, u32)>,
    externalized: IdentityMap<(ClassRef, Arc<dyn Externalizer>, u32)>,
    next: u32,
}

impl ClassHandles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            plain: IdentityMap::with_capacity(capacity),
            externalized: IdentityMap::new(),
            next: 0,
        }
    }

    #[inline]
    pub fn lookup(&self, class: &ClassRef) -> Option<u32> {
        self.plain.get(class.identity()).map(|(_, h)| *h)
    }

    /// The handle and externalizer `class` was first written with.
    #[inline]
    pub fn lookup_externalized(&self, class: &ClassRef) -> Option<(u32, Arc<dyn Externalizer>)> {
        self.externalized
            .get(class.identity())
            .map(|(_, externalizer, h)| (*h, externalizer.clone()))
    }

    pub fn assign(&mut self, class: &ClassRef) -> u32 {
        let handle = self.next_handle();
        self.plain.insert(class.identity(), (class.clone(), handle));
        handle
    }

    pub fn assign_externalized(&mut self, class: &ClassRef, externalizer: Arc<dyn Externalizer>) -> u32 {
        let handle = self.next_handle();
        self.externalized
            .insert(class.identity(), (class.clone(), externalizer, handle));
        handle
    }

    #[inline]
    fn next_handle(&mut self) -> u32 {
        let handle = self.next;
        self.next += 1;
        handle
    }

    pub fn clear(&mut self) {
        self.plain.clear();
        self.externalized.clear();
        self.next = 0;
    }
}

impl fmt::Debug for ClassHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHandles")
            .field("plain", &self.plain.len())
            .field("externalized", &self.externalized.len())
            .field("next", &self.next)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// InstanceTable

#[derive(Debug, Clone)]
enum Slot {
    /// Reserved, object not yet constructed.
    Pending,
    Bound(Value),
    /// Consumed by an unshared read, never resolvable.
    Unshared,
}

/// Read-side table from instance handle to value.
#[derive(Debug, Default)]
pub(crate) struct InstanceTable {
    slots: Vec<Slot>,
}

impl InstanceTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Reserves the next handle, before the object it names exists.
    pub fn reserve(&mut self, unshared: bool) -> u32 {
        let handle = self.slots.len() as u32;
        self.slots.push(if unshared { Slot::Unshared } else { Slot::Pending });
        handle
    }

    /// Binds a reserved handle. Unshared handles stay unresolvable.
    pub fn bind(&mut self, handle: u32, value: Value) {
        if let Some(slot) = self.slots.get_mut(handle as usize)
            && !matches!(slot, Slot::Unshared)
        {
            *slot = Slot::Bound(value);
        }
    }

    pub fn resolve(&self, handle: u32) -> Result<Value> {
        match self.slots.get(handle as usize) {
            Some(Slot::Bound(value)) => Ok(value.clone()),
            Some(Slot::Pending) => Err(Corruption::UnboundHandle(handle).into()),
            Some(Slot::Unshared) => Err(Corruption::UnsharedHandle(handle).into()),
            None => Err(Corruption::UnknownHandle(handle).into()),
        }
    }

    /// Number of handles reserved so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

// -----------------------------------------------------------------------------
// ClassTable

/// Read-side table from class handle to stream class.
#[derive(Debug, Default)]
pub(crate) struct StreamClassTable {
    classes: Vec<Arc<StreamClass>>,
}

impl StreamClassTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            classes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, class: Arc<StreamClass>) -> u32 {
        let handle = self.classes.len() as u32;
        self.classes.push(class);
        handle
    }

    pub fn get(&self, handle: u32) -> Result<Arc<StreamClass>> {
        self.classes
            .get(handle as usize)
            .cloned()
            .ok_or_else(|| Corruption::UnknownClassHandle(handle).into())
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }
}
