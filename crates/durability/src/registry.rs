//! Type registry for structured payloads
//!
//! Maps Rust types to the stable names written into persisted elements.
//! Each database owns its own registry, so independent databases in the
//! same process never see each other's registrations.

use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;

/// Registry of persistable types
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeId, String>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Register `T` under its Rust type name
    pub fn register<T: 'static>(&self) {
        self.register_name::<T>(type_name::<T>());
    }

    /// Register `T` under an explicit name
    ///
    /// Registering the same type again replaces its name.
    pub fn register_name<T: 'static>(&self, name: impl Into<String>) {
        self.types.write().insert(TypeId::of::<T>(), name.into());
    }

    /// Name `T` was registered under
    pub fn name_of<T: 'static>(&self) -> Option<String> {
        self.types.read().get(&TypeId::of::<T>()).cloned()
    }

    /// Check whether `T` is registered
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.types.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point;
    struct Line;

    #[test]
    fn test_register_by_type_name() {
        let registry = TypeRegistry::new();
        registry.register::<Point>();

        let name = registry.name_of::<Point>().unwrap();
        assert!(name.ends_with("Point"));
        assert!(registry.is_registered::<Point>());
        assert!(!registry.is_registered::<Line>());
    }

    #[test]
    fn test_register_name_replaces() {
        let registry = TypeRegistry::new();
        registry.register_name::<Point>("pt");
        registry.register_name::<Point>("point");

        assert_eq!(registry.name_of::<Point>().as_deref(), Some("point"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = TypeRegistry::new();
        let b = TypeRegistry::new();
        a.register_name::<Line>("line");

        assert!(a.is_registered::<Line>());
        assert!(b.is_empty());
    }
}
