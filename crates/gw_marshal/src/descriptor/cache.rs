use alloc::sync::Arc;
use alloc::vec::Vec;

use gw_utils::IdentityMap;

use crate::DescriptorCachePolicy;
use crate::class::{ClassKind, ClassRef};
use crate::descriptor::ClassDescriptor;

// -----------------------------------------------------------------------------
// Hierarchy helpers

/// Returns `true` if `class` contributes a field level to the default encoding.
#[inline]
pub(crate) fn is_serializable_level(class: &ClassRef) -> bool {
    matches!(class.kind(), ClassKind::Ordinary) && class.is_serializable() && !class.is_externalizable()
}

/// The nearest strict superclass that is a serializable level.
pub(crate) fn serializable_super(class: &ClassRef) -> Option<&ClassRef> {
    let mut next = class.super_class();
    while let Some(candidate) = next {
        if is_serializable_level(candidate) {
            return Some(candidate);
        }
        next = candidate.super_class();
    }
    None
}

/// The serializable levels of `class`, topmost first.
pub(crate) fn serializable_levels(class: &ClassRef) -> Vec<ClassRef> {
    let mut levels = Vec::new();
    if is_serializable_level(class) {
        levels.push(class.clone());
    }
    let mut next = serializable_super(class);
    while let Some(level) = next {
        levels.push(level.clone());
        next = serializable_super(level);
    }
    levels.reverse();
    levels
}

// -----------------------------------------------------------------------------
// DescriptorCache

/// Memoizes [`ClassDescriptor`]s.
///
/// With [`DescriptorCachePolicy::Session`] the descriptors live in this
/// cache and are dropped with the session. With
/// [`DescriptorCachePolicy::Process`] they are stored once per class and
/// shared by every session in the process.
#[derive(Debug)]
pub struct DescriptorCache {
    policy: DescriptorCachePolicy,
    session: IdentityMap<(ClassRef, Arc<ClassDescriptor>)>,
}

impl DescriptorCache {
    pub fn new(policy: DescriptorCachePolicy) -> Self {
        Self {
            policy,
            session: IdentityMap::new(),
        }
    }

    #[inline]
    pub fn policy(&self) -> DescriptorCachePolicy {
        self.policy
    }

    /// Returns the descriptor of `class`, computing it on first use.
    pub fn describe(&mut self, class: &ClassRef) -> Arc<ClassDescriptor> {
        match self.policy {
            DescriptorCachePolicy::Process => process_descriptor(class),
            DescriptorCachePolicy::Session => {
                if let Some((_, descriptor)) = self.session.get(class.identity()) {
                    return descriptor.clone();
                }
                let super_descriptor = serializable_super(class).map(|s| self.describe(s));
                let descriptor = Arc::new(ClassDescriptor::compute(class, super_descriptor));
                self.session
                    .insert(class.identity(), (class.clone(), descriptor.clone()));
                descriptor
            }
        }
    }

    /// Number of descriptors held by this cache.
    ///
    /// Always zero under the process policy.
    #[inline]
    pub fn len(&self) -> usize {
        self.session.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.session.is_empty()
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }
}

fn process_descriptor(class: &ClassRef) -> Arc<ClassDescriptor> {
    class
        .descriptor_cell()
        .get_or_init(|| {
            let super_descriptor = serializable_super(class).map(process_descriptor);
            Arc::new(ClassDescriptor::compute(class, super_descriptor))
        })
        .clone()
}
