//! Typed, heterogeneous metadata attached to type and field configs.
//!
//! Plugins key their data by Rust type, so each plugin reads back exactly the
//! type it stored and two plugins never clobber each other's entries unless
//! they share a type on purpose.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

type Entry = (&'static str, Arc<dyn Any + Send + Sync>);

/// Type-keyed extension bag.
///
/// Values are stored behind `Arc`, so cloning a config that carries
/// extensions is cheap and values are shared, not deep-copied.
#[derive(Clone, Default)]
pub struct Extensions {
    map: IndexMap<TypeId, Entry>,
}

impl Extensions {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    ///
    /// Returns `true` if a previous value was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> bool {
        self.map
            .insert(
                TypeId::of::<T>(),
                (std::any::type_name::<T>(), Arc::new(value)),
            )
            .is_some()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Returns the value of type `T`, if present.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|(_, value)| value.downcast_ref::<T>())
    }

    /// Returns whether a value of type `T` is present.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Removes the value of type `T`. Returns `true` if one was present.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> bool {
        self.map.shift_remove(&TypeId::of::<T>()).is_some()
    }

    /// Copies entries from `other` that are not already present here.
    pub fn merge_missing(&mut self, other: &Extensions) {
        for (id, entry) in &other.map {
            self.map.entry(*id).or_insert_with(|| entry.clone());
        }
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.map.values().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct A(u32);

    #[derive(Debug, PartialEq)]
    struct B(u32);

    #[test]
    fn test_typed_lookup() {
        let mut ext = Extensions::new();
        assert!(!ext.insert(A(1)));
        assert!(ext.insert(A(2)));
        ext.insert(B(3));

        assert_eq!(ext.get::<A>(), Some(&A(2)));
        assert_eq!(ext.get::<B>(), Some(&B(3)));
        assert_eq!(ext.len(), 2);
        assert!(ext.remove::<A>());
        assert!(!ext.contains::<A>());
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut field = Extensions::new().with(A(1));
        let parent = Extensions::new().with(A(9)).with(B(2));
        field.merge_missing(&parent);

        assert_eq!(field.get::<A>(), Some(&A(1)));
        assert_eq!(field.get::<B>(), Some(&B(2)));
    }

    #[test]
    fn test_clone_shares_values() {
        let ext = Extensions::new().with(A(5));
        let copy = ext.clone();
        assert_eq!(copy.get::<A>(), Some(&A(5)));
        assert!(format!("{ext:?}").contains("A"));
    }
}
