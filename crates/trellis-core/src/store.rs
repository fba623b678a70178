//! The config store: arena of refs plus deferred type configuration.
//!
//! Registration writes a stub (the [`TypeConfig`] and its unevaluated field
//! factories); linking happens later in the build pass. Factories are never
//! called here, which is what lets two types refer to each other before
//! either has fields.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::builder::FieldsFactory;
use crate::error::SchemaError;
use crate::refs::{AnyRef, Ref, RefId, RefKind, TypeKind, TypeParam, is_valid_graphql_name, scalars};
use crate::types::{KindOptions, TypeConfig};
use crate::Result;

struct Slot {
    kind: TypeKind,
    name: Arc<str>,
    config: Option<TypeConfig>,
    factories: Vec<FieldsFactory>,
}

/// Registry of every ref and type known to one builder.
pub struct ConfigStore {
    slots: Vec<Slot>,
    /// Implemented type names, in registration order.
    names: IndexMap<String, RefId>,
    /// Aliases: extra names and Rust types pointing at a ref.
    params: HashMap<TypeParam, RefId>,
    /// Interface name to implementing object names.
    implementers: IndexMap<String, IndexSet<String>>,
    frozen: bool,
}

impl ConfigStore {
    /// Creates a store with the built-in scalars registered.
    #[must_use]
    pub fn new() -> Self {
        let mut store = Self {
            slots: Vec::new(),
            names: IndexMap::new(),
            params: HashMap::new(),
            implementers: IndexMap::new(),
            frozen: false,
        };
        for name in scalars::BUILTIN {
            let id = store.alloc(TypeKind::Scalar, Arc::from(name));
            let config = TypeConfig {
                name: name.to_string(),
                kind: TypeKind::Scalar,
                description: None,
                interfaces: Vec::new(),
                extensions: Default::default(),
                options: KindOptions::Scalar {
                    specified_by_url: None,
                    validator: None,
                    builtin: true,
                },
            };
            store.slots[id.0].config = Some(config);
            store.names.insert(name.to_string(), id);
        }
        store
    }

    fn alloc(&mut self, kind: TypeKind, name: Arc<str>) -> RefId {
        let id = RefId(self.slots.len());
        self.slots.push(Slot {
            kind,
            name,
            config: None,
            factories: Vec::new(),
        });
        id
    }

    /// Allocates a new ref. Nothing is registered under its name yet.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] if `name` is not a GraphQL name.
    pub fn create_ref<K: RefKind>(&mut self, name: &str) -> Result<Ref<K>> {
        let any = self.create_any(K::KIND, name)?;
        Ok(Ref::new(any.id, any.name))
    }

    /// Allocates a new ref whose kind is only known at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] if `name` is not a GraphQL name.
    pub fn create_any(&mut self, kind: TypeKind, name: &str) -> Result<AnyRef> {
        if !is_valid_graphql_name(name) {
            return Err(SchemaError::InvalidName {
                name: name.to_string(),
            });
        }
        let name: Arc<str> = Arc::from(name);
        let id = self.alloc(kind, Arc::clone(&name));
        trace!(%id, type_name = %name, %kind, "Created ref");
        Ok(AnyRef { id, kind, name })
    }

    /// Registers the configuration for `id`.
    ///
    /// Declared interfaces that can already be named are added to the
    /// implementer index.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::StoreFrozen`] after [`freeze`](Self::freeze)
    /// - [`SchemaError::DuplicateImplementation`] if `id` already has a config
    /// - [`SchemaError::DuplicateTypeName`] if another ref owns the name
    pub fn register(&mut self, id: RefId, config: TypeConfig) -> Result<()> {
        if self.frozen {
            return Err(SchemaError::StoreFrozen { name: config.name });
        }
        let slot = self.slot(id)?;
        if slot.config.is_some() {
            return Err(SchemaError::DuplicateImplementation { name: config.name });
        }
        if let Some(owner) = self.names.get(&config.name) {
            if *owner != id {
                return Err(SchemaError::DuplicateTypeName { name: config.name });
            }
        }
        if let Some(owner) = self.params.get(&TypeParam::Name(config.name.clone())) {
            if *owner != id {
                return Err(SchemaError::DuplicateTypeName { name: config.name });
            }
        }

        let name = config.name.clone();
        let object_like = config.kind.is_object_like();
        let interfaces: Vec<String> = config
            .interfaces
            .iter()
            .filter_map(|param| self.param_name(param))
            .collect();

        self.slots[id.0].config = Some(config);
        self.names.insert(name.clone(), id);
        if object_like {
            for interface in interfaces {
                self.link_implementer(&interface, &name);
            }
        }
        trace!(type_name = %name, "Registered type");
        Ok(())
    }

    /// Queues a field factory for `id`. The ref does not need to be
    /// implemented yet.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::StoreFrozen`] after [`freeze`](Self::freeze).
    pub(crate) fn add_fields(&mut self, id: RefId, factory: FieldsFactory) -> Result<()> {
        if self.frozen {
            let name = self.slot(id)?.name.to_string();
            return Err(SchemaError::StoreFrozen { name });
        }
        self.slot(id)?;
        self.slots[id.0].factories.push(factory);
        Ok(())
    }

    /// Takes the queued field factories of `id`, leaving none behind.
    pub(crate) fn take_fields(&mut self, id: RefId) -> Vec<FieldsFactory> {
        self.slots
            .get_mut(id.0)
            .map(|slot| std::mem::take(&mut slot.factories))
            .unwrap_or_default()
    }

    /// Resolves a parameter to its canonical ref id.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingType`] if nothing is known under the
    /// parameter.
    pub fn resolve(&self, param: &TypeParam, referenced_by: &str) -> Result<RefId> {
        let found = match param {
            TypeParam::Ref(id) => Some(*id).filter(|id| id.0 < self.slots.len()),
            TypeParam::Name(name) => self
                .names
                .get(name)
                .or_else(|| self.params.get(param))
                .copied(),
            TypeParam::Rust { .. } => self.params.get(param).copied(),
        };
        found.ok_or_else(|| SchemaError::MissingType {
            name: param.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Returns the configuration behind a parameter.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingType`] if the parameter names nothing
    /// - [`SchemaError::UnimplementedRef`] if the ref has no config
    /// - [`SchemaError::TypeKindMismatch`] if `expected` is given and differs
    pub fn get_config(&self, param: &TypeParam, expected: Option<TypeKind>) -> Result<&TypeConfig> {
        self.lookup(param, expected, "get_config")
    }

    pub(crate) fn lookup(
        &self,
        param: &TypeParam,
        expected: Option<TypeKind>,
        referenced_by: &str,
    ) -> Result<&TypeConfig> {
        let id = self.resolve(param, referenced_by)?;
        let config = self.config(id, referenced_by)?;
        match expected {
            Some(kind) if kind != config.kind => Err(SchemaError::TypeKindMismatch {
                name: config.name.clone(),
                expected: kind.to_string(),
                actual: config.kind,
            }),
            _ => Ok(config),
        }
    }

    /// The config registered for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnimplementedRef`] if `id` has no config.
    pub fn config(&self, id: RefId, referenced_by: &str) -> Result<&TypeConfig> {
        let slot = self.slot(id)?;
        slot.config.as_ref().ok_or_else(|| SchemaError::UnimplementedRef {
            name: slot.name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Records that `object` implements `interface`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::StoreFrozen`] after [`freeze`](Self::freeze).
    pub fn register_implementer(&mut self, interface: &str, object: &str) -> Result<()> {
        if self.frozen {
            return Err(SchemaError::StoreFrozen {
                name: object.to_string(),
            });
        }
        self.link_implementer(interface, object);
        Ok(())
    }

    pub(crate) fn link_implementer(&mut self, interface: &str, object: &str) {
        self.implementers
            .entry(interface.to_string())
            .or_default()
            .insert(object.to_string());
    }

    /// Object types implementing `interface`, in registration order.
    #[must_use]
    pub fn get_implementers(&self, interface: &str) -> Vec<&str> {
        self.implementers
            .get(interface)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Makes `name` resolve to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::StoreFrozen`] after [`freeze`](Self::freeze) and
    /// [`SchemaError::DuplicateTypeName`] if `name` already points elsewhere.
    pub fn associate_ref_with_name(&mut self, id: RefId, name: &str) -> Result<()> {
        if let Some(owner) = self.names.get(name) {
            if *owner != id {
                return Err(SchemaError::DuplicateTypeName {
                    name: name.to_string(),
                });
            }
        }
        self.associate_param_with_ref(TypeParam::Name(name.to_string()), id)
    }

    /// Makes `param` (a name or a Rust type) resolve to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::StoreFrozen`] after [`freeze`](Self::freeze) and
    /// [`SchemaError::DuplicateTypeName`] if `param` already points elsewhere.
    pub fn associate_param_with_ref(&mut self, param: TypeParam, id: RefId) -> Result<()> {
        let slot_name = self.slot(id)?.name.to_string();
        if self.frozen {
            return Err(SchemaError::StoreFrozen { name: slot_name });
        }
        if let Some(owner) = self.params.get(&param) {
            if *owner != id {
                return Err(SchemaError::DuplicateTypeName {
                    name: param.to_string(),
                });
            }
        }
        trace!(param = %param, type_name = %slot_name, "Associated param with ref");
        self.params.insert(param, id);
        Ok(())
    }

    /// Ends the definition phase.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether [`freeze`](Self::freeze) was called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registered type configs, in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeConfig> {
        self.names
            .values()
            .filter_map(|id| self.slots[id.0].config.as_ref())
    }

    /// Registered ref ids, in registration order.
    pub(crate) fn registered_ids(&self) -> Vec<RefId> {
        self.names.values().copied().collect()
    }

    /// Name and kind of a ref, implemented or not.
    #[must_use]
    pub fn ref_info(&self, id: RefId) -> Option<(&str, TypeKind)> {
        self.slots.get(id.0).map(|slot| (&*slot.name, slot.kind))
    }

    /// Ids of refs that have queued fields but were never implemented.
    pub(crate) fn orphaned_fields(&self) -> Vec<RefId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.config.is_none() && !slot.factories.is_empty())
            .map(|(i, _)| RefId(i))
            .collect()
    }

    /// Number of registered types, built-in scalars included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no types are registered. Never true in practice because the
    /// built-in scalars are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn slot(&self, id: RefId) -> Result<&Slot> {
        self.slots.get(id.0).ok_or_else(|| SchemaError::MissingType {
            name: id.to_string(),
            referenced_by: "config store".to_string(),
        })
    }

    fn param_name(&self, param: &TypeParam) -> Option<String> {
        match param {
            TypeParam::Name(name) => Some(name.clone()),
            TypeParam::Ref(id) => self.slots.get(id.0).map(|slot| slot.name.to_string()),
            TypeParam::Rust { .. } => self
                .params
                .get(param)
                .and_then(|id| self.slots.get(id.0))
                .map(|slot| slot.name.to_string()),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("refs", &self.slots.len())
            .field("types", &self.names.keys().collect::<Vec<_>>())
            .field("implementers", &self.implementers)
            .field("frozen", &self.frozen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::{InterfaceKind, ObjectKind};

    fn object(name: &str, interfaces: Vec<TypeParam>) -> TypeConfig {
        TypeConfig {
            name: name.to_string(),
            kind: TypeKind::Object,
            description: None,
            interfaces,
            extensions: Default::default(),
            options: KindOptions::Object { is_type_of: None },
        }
    }

    #[test]
    fn test_builtin_scalars_registered() {
        let store = ConfigStore::new();
        let config = store
            .get_config(&TypeParam::from("String"), Some(TypeKind::Scalar))
            .unwrap();
        assert!(config.is_builtin());
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_create_ref_has_no_side_effect() {
        let mut store = ConfigStore::new();
        let user = store.create_ref::<ObjectKind>("User").unwrap();
        assert_eq!(store.len(), 5);
        assert!(matches!(
            store.get_config(&TypeParam::from("User"), None),
            Err(SchemaError::MissingType { .. })
        ));
        assert!(matches!(
            store.get_config(&TypeParam::from(&user), None),
            Err(SchemaError::UnimplementedRef { .. })
        ));
    }

    #[test]
    fn test_duplicate_type_name() {
        let mut store = ConfigStore::new();
        let a = store.create_ref::<ObjectKind>("User").unwrap();
        let b = store.create_ref::<ObjectKind>("User").unwrap();
        store.register(a.id(), object("User", vec![])).unwrap();

        let err = store.register(b.id(), object("User", vec![])).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateTypeName { ref name } if name == "User"));
        // The first registration is still the one the name resolves to.
        assert_eq!(store.resolve(&TypeParam::from("User"), "test").unwrap(), a.id());
    }

    #[test]
    fn test_duplicate_implementation() {
        let mut store = ConfigStore::new();
        let a = store.create_ref::<ObjectKind>("User").unwrap();
        store.register(a.id(), object("User", vec![])).unwrap();
        assert!(matches!(
            store.register(a.id(), object("User", vec![])),
            Err(SchemaError::DuplicateImplementation { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut store = ConfigStore::new();
        let a = store.create_ref::<ObjectKind>("User").unwrap();
        store.register(a.id(), object("User", vec![])).unwrap();
        let err = store
            .get_config(&TypeParam::from("User"), Some(TypeKind::Interface))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeKindMismatch { .. }));
        assert!(err.to_string().contains("User"));
    }

    #[test]
    fn test_implementers_keep_registration_order() {
        let mut store = ConfigStore::new();
        let node = store.create_ref::<InterfaceKind>("Node").unwrap();
        let droid = store.create_ref::<ObjectKind>("Droid").unwrap();
        let human = store.create_ref::<ObjectKind>("Human").unwrap();

        store
            .register(droid.id(), object("Droid", vec![TypeParam::from(&node)]))
            .unwrap();
        store
            .register(human.id(), object("Human", vec![TypeParam::from("Node")]))
            .unwrap();
        store.register_implementer("Node", "Droid").unwrap();

        assert_eq!(store.get_implementers("Node"), vec!["Droid", "Human"]);
        assert!(store.get_implementers("Missing").is_empty());
    }

    #[test]
    fn test_associations() {
        struct Human;

        let mut store = ConfigStore::new();
        let human = store.create_ref::<ObjectKind>("Human").unwrap();
        store
            .associate_param_with_ref(TypeParam::of::<Human>(), human.id())
            .unwrap();
        store.associate_ref_with_name(human.id(), "Person").unwrap();
        store.register(human.id(), object("Human", vec![])).unwrap();

        for param in [TypeParam::of::<Human>(), TypeParam::from("Person")] {
            assert_eq!(store.get_config(&param, None).unwrap().name, "Human");
        }
    }

    #[test]
    fn test_frozen_store_rejects_registration() {
        let mut store = ConfigStore::new();
        let a = store.create_ref::<ObjectKind>("User").unwrap();
        store.freeze();
        assert!(store.is_frozen());
        assert!(matches!(
            store.register(a.id(), object("User", vec![])),
            Err(SchemaError::StoreFrozen { .. })
        ));
        assert!(matches!(
            store.register_implementer("Node", "User"),
            Err(SchemaError::StoreFrozen { .. })
        ));
    }

    #[test]
    fn test_invalid_name() {
        let mut store = ConfigStore::new();
        assert!(matches!(
            store.create_ref::<ObjectKind>("not-valid"),
            Err(SchemaError::InvalidName { .. })
        ));
    }
}
