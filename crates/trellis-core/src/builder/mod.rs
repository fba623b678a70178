//! The schema builder: the user-facing definition API.
//!
//! Every method here only records configuration in the [`ConfigStore`].
//! Types are linked, transformed by plugins and lowered in
//! [`SchemaBuilder::build`].

mod enums;
mod fields;
mod options;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

pub use enums::{EnumValueOptions, EnumValues};
pub use fields::{FieldBuilder, FieldRef, FieldsFactory, InputFieldBuilder, InputFieldRef, InputFieldsFn, OutputFieldsFn};
pub use options::{
    EnumTypeOptions, ImplementOptions, InputTypeOptions, InterfaceTypeOptions, ObjectTypeOptions,
    RootTypeOptions, ScalarTypeOptions, TypeDefinition, UnionTypeOptions,
};

use crate::config::BuilderOptions;
use crate::plugin::{Plugin, PluginRegistry};
use crate::refs::{
    AnyRef, EnumRef, InputRef, InterfaceRef, ObjectRef, Ref, RefKind, ScalarRef, TypeKind,
    TypeParam, UnionRef,
};
use crate::schema::BuiltSchema;
use crate::store::ConfigStore;
use crate::Result;

/// Accumulates type definitions and builds them into a schema.
///
/// Builders are single-use: [`build`](Self::build) consumes the builder and
/// freezes its store.
///
/// # Example
///
/// ```ignore
/// let mut builder = SchemaBuilder::new(BuilderOptions::default());
/// let character = builder.interface_ref("Character")?;
///
/// builder.query_type(RootTypeOptions::new().fields({
///     let character = character.clone();
///     move |t| [("hero", t.field(&character).resolve(|_| async { Ok(hero()) }))]
/// }))?;
///
/// character.implement(&mut builder, InterfaceTypeOptions::new().fields(|t| [
///     ("id", t.expose_id("id")),
///     ("name", t.expose_string("name")),
/// ]))?;
///
/// let schema = builder.build()?;
/// ```
pub struct SchemaBuilder {
    options: BuilderOptions,
    registry: PluginRegistry,
    plugins: Vec<Arc<dyn Plugin>>,
    store: ConfigStore,
    roots: IndexMap<TypeKind, AnyRef>,
}

impl SchemaBuilder {
    /// Creates a builder with an empty plugin registry.
    #[must_use]
    pub fn new(options: BuilderOptions) -> Self {
        Self::with_registry(options, PluginRegistry::new())
    }

    /// Creates a builder resolving `options.plugins` against `registry`.
    #[must_use]
    pub fn with_registry(options: BuilderOptions, registry: PluginRegistry) -> Self {
        Self {
            options,
            registry,
            plugins: Vec::new(),
            store: ConfigStore::new(),
            roots: IndexMap::new(),
        }
    }

    /// Builder configuration.
    #[must_use]
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// The underlying config store.
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable access to the config store, for plugins that register their
    /// own types or associations during the definition phase.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Adds a plugin instance. Instances run after plugins named in the
    /// options, in the order they were added. Plugin names must be unique
    /// across the whole chain or the build fails.
    pub fn plugin(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        debug!(plugin = plugin.name(), "Added plugin instance");
        self.plugins.push(plugin);
        self
    }

    /// Creates a ref of kind `K`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`](crate::SchemaError::InvalidName) for names that are not GraphQL names.
    pub fn create_ref<K: RefKind>(&mut self, name: &str) -> Result<Ref<K>> {
        self.store.create_ref(name)
    }

    pub fn object_ref(&mut self, name: &str) -> Result<ObjectRef> {
        self.create_ref(name)
    }

    pub fn interface_ref(&mut self, name: &str) -> Result<InterfaceRef> {
        self.create_ref(name)
    }

    pub fn union_ref(&mut self, name: &str) -> Result<UnionRef> {
        self.create_ref(name)
    }

    pub fn enum_ref(&mut self, name: &str) -> Result<EnumRef> {
        self.create_ref(name)
    }

    pub fn scalar_ref(&mut self, name: &str) -> Result<ScalarRef> {
        self.create_ref(name)
    }

    pub fn input_ref(&mut self, name: &str) -> Result<InputRef> {
        self.create_ref(name)
    }

    /// Supplies the definition of a ref. Equivalent to [`Ref::implement`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateImplementation`] on a second call for
    /// the same ref, [`SchemaError::DuplicateTypeName`] if another ref owns the
    /// name and [`SchemaError::StoreFrozen`] after build started.
    pub fn implement<K: RefKind>(&mut self, r: &Ref<K>, options: K::Options) -> Result<()> {
        self.implement_any(&r.erase(), options.into_definition(r.name(), K::KIND))
    }

    fn implement_any(&mut self, r: &AnyRef, definition: TypeDefinition) -> Result<()> {
        let TypeDefinition { config, factories } = definition;
        self.store.register(r.id(), config)?;
        for factory in factories {
            self.store.add_fields(r.id(), factory)?;
        }
        Ok(())
    }

    /// Defines an object type in one step.
    pub fn object_type(&mut self, name: &str, options: ObjectTypeOptions) -> Result<ObjectRef> {
        let r = self.object_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    pub fn interface_type(&mut self, name: &str, options: InterfaceTypeOptions) -> Result<InterfaceRef> {
        let r = self.interface_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    pub fn union_type(&mut self, name: &str, options: UnionTypeOptions) -> Result<UnionRef> {
        let r = self.union_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    pub fn enum_type(&mut self, name: &str, options: EnumTypeOptions) -> Result<EnumRef> {
        let r = self.enum_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    pub fn scalar_type(&mut self, name: &str, options: ScalarTypeOptions) -> Result<ScalarRef> {
        let r = self.scalar_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    pub fn input_type(&mut self, name: &str, options: InputTypeOptions) -> Result<InputRef> {
        let r = self.input_ref(name)?;
        self.implement(&r, options)?;
        Ok(r)
    }

    fn root_ref(&mut self, kind: TypeKind) -> Result<AnyRef> {
        if let Some(r) = self.roots.get(&kind) {
            return Ok(r.clone());
        }
        let r = self.store.create_any(kind, root_name(kind))?;
        self.roots.insert(kind, r.clone());
        Ok(r)
    }

    fn root_type(&mut self, kind: TypeKind, options: RootTypeOptions) -> Result<()> {
        let r = self.root_ref(kind)?;
        self.implement_any(&r, options.into_definition(root_name(kind), kind))
    }

    /// Defines the Query root type. A schema needs either this or at least
    /// one root field added through [`query_field`](Self::query_field).
    pub fn query_type(&mut self, options: RootTypeOptions) -> Result<()> {
        self.root_type(TypeKind::Query, options)
    }

    pub fn mutation_type(&mut self, options: RootTypeOptions) -> Result<()> {
        self.root_type(TypeKind::Mutation, options)
    }

    pub fn subscription_type(&mut self, options: RootTypeOptions) -> Result<()> {
        self.root_type(TypeKind::Subscription, options)
    }

    fn add_output_fields<F, I, K>(&mut self, target: &AnyRef, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.store.add_fields(target.id(), fields::output_fields(f))
    }

    /// Adds fields to an object type. May be called before the ref is
    /// implemented; duplicate names fail the build.
    pub fn object_fields<F, I, K>(&mut self, r: &ObjectRef, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.add_output_fields(&r.erase(), f)
    }

    pub fn interface_fields<F, I, K>(&mut self, r: &InterfaceRef, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.add_output_fields(&r.erase(), f)
    }

    pub fn input_fields<F, I, K>(&mut self, r: &InputRef, f: F) -> Result<()>
    where
        F: FnOnce(&InputFieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, InputFieldRef)>,
        K: Into<String>,
    {
        self.store.add_fields(r.id(), fields::input_fields(f))
    }

    pub fn query_fields<F, I, K>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        let r = self.root_ref(TypeKind::Query)?;
        self.add_output_fields(&r, f)
    }

    pub fn mutation_fields<F, I, K>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        let r = self.root_ref(TypeKind::Mutation)?;
        self.add_output_fields(&r, f)
    }

    pub fn subscription_fields<F, I, K>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        let r = self.root_ref(TypeKind::Subscription)?;
        self.add_output_fields(&r, f)
    }

    /// Adds one field to an object type.
    pub fn object_field<F>(&mut self, r: &ObjectRef, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> FieldRef + Send + 'static,
    {
        let name = name.to_string();
        self.object_fields(r, move |t| [(name, f(t))])
    }

    pub fn interface_field<F>(&mut self, r: &InterfaceRef, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> FieldRef + Send + 'static,
    {
        let name = name.to_string();
        self.interface_fields(r, move |t| [(name, f(t))])
    }

    pub fn query_field<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> FieldRef + Send + 'static,
    {
        let name = name.to_string();
        self.query_fields(move |t| [(name, f(t))])
    }

    pub fn mutation_field<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> FieldRef + Send + 'static,
    {
        let name = name.to_string();
        self.mutation_fields(move |t| [(name, f(t))])
    }

    pub fn subscription_field<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&FieldBuilder) -> FieldRef + Send + 'static,
    {
        let name = name.to_string();
        self.subscription_fields(move |t| [(name, f(t))])
    }

    /// Lets fields name the type of `r` by the Rust type `T`, through
    /// [`TypeParam::of`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateTypeName`] if `T` already points at a
    /// different ref.
    pub fn associate<T: 'static, K: RefKind>(&mut self, r: &Ref<K>) -> Result<()> {
        self.store.associate_param_with_ref(TypeParam::of::<T>(), r.id())
    }

    /// Builds the schema, consuming the builder.
    ///
    /// # Errors
    ///
    /// Any build-time [`SchemaError`]: unknown or unimplemented types, kind
    /// mismatches, duplicate fields, plugin failures, a missing Query type or
    /// an engine rejection.
    pub fn build(mut self) -> Result<BuiltSchema> {
        self.implement_declared_roots()?;
        crate::schema::build(self)
    }

    /// Root types that only received fields through `query_fields` and
    /// friends get an empty definition for those fields to attach to.
    fn implement_declared_roots(&mut self) -> Result<()> {
        let pending: Vec<(TypeKind, AnyRef)> = self
            .roots
            .iter()
            .filter(|(_, r)| self.store.config(r.id(), "build").is_err())
            .map(|(kind, r)| (*kind, r.clone()))
            .collect();
        for (kind, r) in pending {
            debug!(type_name = root_name(kind), "Implementing root type from queued fields");
            self.implement_any(&r, RootTypeOptions::new().into_definition(root_name(kind), kind))?;
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (BuilderOptions, PluginRegistry, Vec<Arc<dyn Plugin>>, ConfigStore) {
        (self.options, self.registry, self.plugins, self.store)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new(BuilderOptions::default())
    }
}

fn root_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Mutation => "Mutation",
        TypeKind::Subscription => "Subscription",
        _ => "Query",
    }
}

impl std::fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("options", &self.options)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaError;

    #[test]
    fn test_one_shot_and_implement_converge() {
        let mut builder = SchemaBuilder::default();
        builder
            .object_type("A", ObjectTypeOptions::new().description("d"))
            .unwrap();
        let b = builder.object_ref("B").unwrap();
        b.implement(&mut builder, ObjectTypeOptions::new().description("d"))
            .unwrap();

        let a = builder.store().get_config(&"A".into(), None).unwrap();
        let b = builder.store().get_config(&"B".into(), None).unwrap();
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.description, b.description);
    }

    #[test]
    fn test_implement_twice_fails() {
        let mut builder = SchemaBuilder::default();
        let user = builder.object_ref("User").unwrap();
        user.implement(&mut builder, ObjectTypeOptions::new()).unwrap();
        let err = user
            .implement(&mut builder, ObjectTypeOptions::new())
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateImplementation { .. }));
    }

    #[test]
    fn test_duplicate_type_name_definition_error() {
        let mut builder = SchemaBuilder::default();
        builder.object_type("User", ObjectTypeOptions::new()).unwrap();
        let err = builder
            .object_type("User", ObjectTypeOptions::new())
            .unwrap_err();
        assert!(err.is_definition_error());
        assert!(err.to_string().contains("User"));
    }

    #[test]
    fn test_root_fields_share_one_ref() {
        let mut builder = SchemaBuilder::default();
        builder.query_field("a", |t| t.string()).unwrap();
        builder
            .query_type(RootTypeOptions::new().fields(|t| [("b", t.int())]))
            .unwrap();
        builder.query_field("c", |t| t.boolean()).unwrap();

        let query = builder.store().get_config(&"Query".into(), None).unwrap();
        assert_eq!(query.kind, TypeKind::Query);
        assert_eq!(builder.roots.len(), 1);
    }

    #[test]
    fn test_root_fields_without_root_type() {
        let mut builder = SchemaBuilder::default();
        builder.query_field("hello", |t| t.string()).unwrap();
        let schema = builder.build().unwrap();
        assert!(schema.sdl().contains("hello: String"));
    }
}
