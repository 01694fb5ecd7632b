use core::fmt::Debug;

use crate::hash::{FixedHashState, HashMap};

// -----------------------------------------------------------------------------
// IdentityMap

/// A map keyed by the *identity* of a value rather than by its contents.
///
/// The identity is a plain `usize` supplied by the caller, usually an arena
/// index or the address of a shared allocation. Two values that compare equal
/// but are distinct instances must produce distinct identities.
///
/// The container hides the underlying [`HashMap`] so that the storage can be
/// swapped later without touching the handle tables built on top of it.
///
/// # Examples
///
/// ```
/// use gw_utils::IdentityMap;
///
/// let mut map = IdentityMap::<u32>::new();
/// assert_eq!(map.insert(7, 0), None);
/// assert_eq!(map.insert(7, 1), Some(0));
/// assert_eq!(map.get(7), Some(&1));
/// ```
pub struct IdentityMap<V>(HashMap<usize, V, FixedHashState>);

impl<V> IdentityMap<V> {
    /// Creates an empty `IdentityMap`.
    #[inline]
    pub fn new() -> Self {
        Self(HashMap::with_hasher(FixedHashState))
    }

    /// Creates an empty `IdentityMap` with the specified capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(HashMap::with_capacity_and_hasher(capacity, FixedHashState))
    }

    /// Returns a reference to the value for `identity`.
    #[inline]
    pub fn get(&self, identity: usize) -> Option<&V> {
        self.0.get(&identity)
    }

    /// Inserts a value, returning the previous one if present.
    #[inline]
    pub fn insert(&mut self, identity: usize, v: V) -> Option<V> {
        self.0.insert(identity, v)
    }

    /// Clears the map, keeping the allocated memory for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Returns the number of elements in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Traits

impl<V> Default for IdentityMap<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for IdentityMap<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V: Debug> Debug for IdentityMap<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}
