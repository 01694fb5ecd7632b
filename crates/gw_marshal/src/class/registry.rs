use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use gw_utils::hash::{HashMap, HashSet};

use crate::class::ClassRef;

// -----------------------------------------------------------------------------
// ClassRegistry

/// A registry of known classes, looked up by name during unmarshalling.
///
/// Registering a class also registers its superclass chain. Classes can be
/// found by full name or, when unambiguous, by simple name. Proxy classes
/// are additionally indexed by their interface list.
///
/// # Example
///
/// ```
/// use gw_marshal::class::{ClassInfo, ClassRegistry, FieldType};
///
/// let mut registry = ClassRegistry::new();
/// let class = ClassInfo::builder("shop.Order")
///     .serializable()
///     .field("id", FieldType::Long)
///     .build();
/// registry.register(&class);
///
/// assert!(registry.get("shop.Order").is_some());
/// assert!(registry.get_with_simple_name("Order").is_some());
/// assert!(registry.get("String").is_some());
/// ```
pub struct ClassRegistry {
    classes: HashMap<String, ClassRef>,
    simple_name_to_full: HashMap<String, String>,
    ambiguous_names: HashSet<String>,
    proxies: HashMap<Box<[String]>, ClassRef>,
}

impl Default for ClassRegistry {
    /// See [`ClassRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Create an empty [`ClassRegistry`].
    #[inline]
    pub fn empty() -> Self {
        Self {
            classes: HashMap::default(),
            simple_name_to_full: HashMap::default(),
            ambiguous_names: HashSet::default(),
            proxies: HashMap::default(),
        }
    }

    /// Create a registry with the builtin classes registered.
    ///
    /// - `String` `List` `Map`
    /// - the array classes `[Z` `[B` `[C` `[S` `[I` `[J` `[F` `[D` `[L`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for class in ClassRef::builtins() {
            registry.register(&class);
        }
        registry
    }

    // # Validity
    // The class must **not** already exist.
    fn add_new_class_indices(&mut self, class: &ClassRef) {
        let simple_name = class.simple_name();

        if !self.ambiguous_names.contains(simple_name) {
            if self.simple_name_to_full.contains_key(simple_name) {
                self.simple_name_to_full.remove(simple_name);
                self.ambiguous_names.insert(simple_name.into());
            } else {
                self.simple_name_to_full
                    .insert(simple_name.into(), class.name().into());
            }
        }

        let interfaces = class.interfaces();
        if !interfaces.is_empty() {
            self.proxies.insert(interfaces.into(), class.clone());
        }
    }

    /// Attempts to register `class` if no class of that name exists yet.
    ///
    /// Superclasses are registered first. Returns `false` if the name was
    /// already taken, in which case neither the class nor its superclasses
    /// are touched.
    pub fn register(&mut self, class: &ClassRef) -> bool {
        if self.classes.contains_key(class.name()) {
            return false;
        }
        if let Some(super_class) = class.super_class() {
            self.register(super_class);
        }
        self.add_new_class_indices(class);
        self.classes.insert(class.name().into(), class.clone());
        true
    }

    /// Registers `class`, **overwriting** any class of the same name.
    ///
    /// The simple-name index is only updated for new names.
    pub fn insert(&mut self, class: ClassRef) {
        if !self.classes.contains_key(class.name()) {
            self.add_new_class_indices(&class);
        } else if !class.interfaces().is_empty() {
            self.proxies.insert(class.interfaces().into(), class.clone());
        }
        self.classes.insert(class.name().into(), class);
    }

    /// Removes the class `name`. Returns it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<ClassRef> {
        let class = self.classes.remove(name)?;
        let simple_name = class.simple_name();
        if self
            .simple_name_to_full
            .get(simple_name)
            .is_some_and(|full| full == name)
        {
            self.simple_name_to_full.remove(simple_name);
        }
        self.proxies.retain(|_, c| !c.ptr_eq(&class));
        Some(class)
    }

    /// Returns `true` if a class named `name` is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Looks up a class by its full name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ClassRef> {
        self.classes.get(name)
    }

    /// Looks up a class by its simple name.
    ///
    /// Returns `None` when the simple name is shared by several classes,
    /// see [`ClassRegistry::is_ambiguous`].
    pub fn get_with_simple_name(&self, simple_name: &str) -> Option<&ClassRef> {
        let full = self.simple_name_to_full.get(simple_name)?;
        self.classes.get(full.as_str())
    }

    /// Returns `true` if `simple_name` maps to more than one class.
    #[inline]
    pub fn is_ambiguous(&self, simple_name: &str) -> bool {
        self.ambiguous_names.contains(simple_name)
    }

    /// Finds the proxy class implementing exactly `interfaces`, in order.
    pub fn proxy_class(&self, interfaces: &[String]) -> Option<&ClassRef> {
        self.proxies.get(interfaces)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterates the registered classes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassRef> {
        self.classes.values()
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
