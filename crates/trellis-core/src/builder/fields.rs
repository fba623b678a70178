//! Fluent field builders.
//!
//! Field factories receive a [`FieldBuilder`] (or [`InputFieldBuilder`]) and
//! return named [`FieldRef`]s. Nothing here resolves types: a field only
//! records a [`TypeParam`], so it may name a type that is registered later.

use std::any::Any;
use std::future::Future;

use async_graphql::Value;
use futures_util::Stream;
use indexmap::IndexMap;

use crate::error::SchemaError;
use crate::extensions::Extensions;
use crate::refs::{TypeKind, TypeParam, scalars};
use crate::resolve::{
    ResolveParams, ResolveResult, Resolver, Subscriber, property_resolver, resolver, subscriber,
};
use crate::types::{FieldConfig, FieldType, InputFieldConfig, InputFieldKind};
use crate::Result;

/// Deferred output field map.
pub type OutputFieldsFn = Box<dyn FnOnce(&FieldBuilder) -> Vec<(String, FieldRef)> + Send>;

/// Deferred input field map.
pub type InputFieldsFn = Box<dyn FnOnce(&InputFieldBuilder) -> Vec<(String, InputFieldRef)> + Send>;

/// A queued field factory.
pub enum FieldsFactory {
    Output(OutputFieldsFn),
    Input(InputFieldsFn),
}

pub(crate) fn output_fields<F, I, K>(f: F) -> FieldsFactory
where
    F: FnOnce(&FieldBuilder) -> I + Send + 'static,
    I: IntoIterator<Item = (K, FieldRef)>,
    K: Into<String>,
{
    FieldsFactory::Output(Box::new(move |t| {
        f(t).into_iter().map(|(k, v)| (k.into(), v)).collect()
    }))
}

pub(crate) fn input_fields<F, I, K>(f: F) -> FieldsFactory
where
    F: FnOnce(&InputFieldBuilder) -> I + Send + 'static,
    I: IntoIterator<Item = (K, InputFieldRef)>,
    K: Into<String>,
{
    FieldsFactory::Input(Box::new(move |t| {
        f(t).into_iter().map(|(k, v)| (k.into(), v)).collect()
    }))
}

/// Handed to output field factories.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    parent_type: String,
    parent_kind: TypeKind,
}

impl FieldBuilder {
    pub(crate) fn new(parent_type: impl Into<String>, parent_kind: TypeKind) -> Self {
        Self {
            parent_type: parent_type.into(),
            parent_kind,
        }
    }

    /// Name of the type the fields are being built for.
    #[must_use]
    pub fn parent_type(&self) -> &str {
        &self.parent_type
    }

    /// Kind of the type the fields are being built for.
    #[must_use]
    pub fn parent_kind(&self) -> TypeKind {
        self.parent_kind
    }

    /// A field of the given type, resolved by `parent[fieldName]` unless a
    /// resolver is set.
    pub fn field(&self, ty: impl Into<TypeParam>) -> FieldRef {
        FieldRef::new(FieldType::named(ty))
    }

    /// A list field of the given item type.
    pub fn list_field(&self, ty: impl Into<TypeParam>) -> FieldRef {
        FieldRef::new(FieldType::list_of(ty))
    }

    pub fn string(&self) -> FieldRef {
        self.field(scalars::STRING)
    }

    pub fn int(&self) -> FieldRef {
        self.field(scalars::INT)
    }

    pub fn float(&self) -> FieldRef {
        self.field(scalars::FLOAT)
    }

    pub fn boolean(&self) -> FieldRef {
        self.field(scalars::BOOLEAN)
    }

    pub fn id(&self) -> FieldRef {
        self.field(scalars::ID)
    }

    /// Exposes `parent[property]` as a field of type `ty`.
    ///
    /// The raw property value is passed through unchanged; the engine rejects
    /// values that do not fit the declared type.
    pub fn expose(&self, property: &str, ty: impl Into<TypeParam>) -> FieldRef {
        self.field(ty).resolver(property_resolver(property))
    }

    /// Exposes `parent[property]` as a list field of item type `ty`.
    pub fn expose_list(&self, property: &str, ty: impl Into<TypeParam>) -> FieldRef {
        self.list_field(ty).resolver(property_resolver(property))
    }

    pub fn expose_string(&self, property: &str) -> FieldRef {
        self.expose(property, scalars::STRING)
    }

    pub fn expose_int(&self, property: &str) -> FieldRef {
        self.expose(property, scalars::INT)
    }

    pub fn expose_float(&self, property: &str) -> FieldRef {
        self.expose(property, scalars::FLOAT)
    }

    pub fn expose_boolean(&self, property: &str) -> FieldRef {
        self.expose(property, scalars::BOOLEAN)
    }

    pub fn expose_id(&self, property: &str) -> FieldRef {
        self.expose(property, scalars::ID)
    }

    pub fn expose_string_list(&self, property: &str) -> FieldRef {
        self.expose_list(property, scalars::STRING)
    }

    pub fn expose_int_list(&self, property: &str) -> FieldRef {
        self.expose_list(property, scalars::INT)
    }

    pub fn expose_float_list(&self, property: &str) -> FieldRef {
        self.expose_list(property, scalars::FLOAT)
    }

    pub fn expose_boolean_list(&self, property: &str) -> FieldRef {
        self.expose_list(property, scalars::BOOLEAN)
    }

    pub fn expose_id_list(&self, property: &str) -> FieldRef {
        self.expose_list(property, scalars::ID)
    }

    /// An argument of the given type.
    pub fn arg(&self, ty: impl Into<TypeParam>) -> InputFieldRef {
        InputFieldRef::new(FieldType::named(ty))
    }

    /// A list argument of the given item type.
    pub fn arg_list(&self, ty: impl Into<TypeParam>) -> InputFieldRef {
        InputFieldRef::new(FieldType::list_of(ty))
    }

    pub fn arg_string(&self) -> InputFieldRef {
        self.arg(scalars::STRING)
    }

    pub fn arg_int(&self) -> InputFieldRef {
        self.arg(scalars::INT)
    }

    pub fn arg_float(&self) -> InputFieldRef {
        self.arg(scalars::FLOAT)
    }

    pub fn arg_boolean(&self) -> InputFieldRef {
        self.arg(scalars::BOOLEAN)
    }

    pub fn arg_id(&self) -> InputFieldRef {
        self.arg(scalars::ID)
    }
}

/// An output field under construction.
#[must_use]
pub struct FieldRef {
    field_type: FieldType,
    args: Vec<(String, InputFieldRef)>,
    description: Option<String>,
    deprecation_reason: Option<String>,
    resolver: Option<Resolver>,
    subscribe: Option<Subscriber>,
    extensions: Extensions,
}

impl FieldRef {
    /// A field of the given declared type.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            args: Vec::new(),
            description: None,
            deprecation_reason: None,
            resolver: None,
            subscribe: None,
            extensions: Extensions::new(),
        }
    }

    /// Turns the field into a list of its type.
    pub fn list(mut self) -> Self {
        self.field_type.list = true;
        self
    }

    /// Sets the field's own nullability, overriding the builder default.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.field_type.nullable = Some(nullable);
        self
    }

    /// Sets list item nullability, overriding the builder default.
    pub fn items_nullable(mut self, nullable: bool) -> Self {
        self.field_type.items_nullable = Some(nullable);
        self
    }

    /// Adds an argument. Repeating a name fails the build.
    pub fn arg(mut self, name: impl Into<String>, arg: InputFieldRef) -> Self {
        self.args.push((name.into(), arg));
        self
    }

    /// Sets the resolver from an async closure.
    pub fn resolve<F, Fut>(self, f: F) -> Self
    where
        F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult> + Send + 'static,
    {
        self.resolver(resolver(f))
    }

    /// Sets an already boxed resolver.
    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the event source of a subscription field.
    pub fn subscribe<F, Fut, S>(mut self, f: F) -> Self
    where
        F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<S>> + Send + 'static,
        S: Stream<Item = ResolveResult> + Send + 'static,
    {
        self.subscribe = Some(subscriber(f));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    /// Attaches plugin metadata.
    pub fn extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub(crate) fn into_config(self, name: &str, parent_type: &str, parent_kind: TypeKind) -> Result<FieldConfig> {
        let mut args = IndexMap::with_capacity(self.args.len());
        for (arg_name, arg) in self.args {
            if args.contains_key(&arg_name) {
                return Err(SchemaError::DuplicateField {
                    type_name: format!("{parent_type}.{name}"),
                    field: arg_name,
                });
            }
            let config = arg.into_config(
                &arg_name,
                parent_type,
                InputFieldKind::Argument {
                    field: name.to_string(),
                },
            );
            args.insert(arg_name, config);
        }

        Ok(FieldConfig {
            name: name.to_string(),
            parent_type: parent_type.to_string(),
            parent_kind,
            field_type: self.field_type,
            resolved_type: None,
            args,
            description: self.description,
            deprecation_reason: self.deprecation_reason,
            resolver: self.resolver,
            subscribe: self.subscribe,
            extensions: self.extensions,
        })
    }
}

/// Handed to input object field factories.
#[derive(Debug, Clone)]
pub struct InputFieldBuilder {
    parent_type: String,
}

impl InputFieldBuilder {
    pub(crate) fn new(parent_type: impl Into<String>) -> Self {
        Self {
            parent_type: parent_type.into(),
        }
    }

    /// Name of the input object being built.
    #[must_use]
    pub fn parent_type(&self) -> &str {
        &self.parent_type
    }

    pub fn field(&self, ty: impl Into<TypeParam>) -> InputFieldRef {
        InputFieldRef::new(FieldType::named(ty))
    }

    pub fn list(&self, ty: impl Into<TypeParam>) -> InputFieldRef {
        InputFieldRef::new(FieldType::list_of(ty))
    }

    pub fn string(&self) -> InputFieldRef {
        self.field(scalars::STRING)
    }

    pub fn int(&self) -> InputFieldRef {
        self.field(scalars::INT)
    }

    pub fn float(&self) -> InputFieldRef {
        self.field(scalars::FLOAT)
    }

    pub fn boolean(&self) -> InputFieldRef {
        self.field(scalars::BOOLEAN)
    }

    pub fn id(&self) -> InputFieldRef {
        self.field(scalars::ID)
    }
}

/// An argument or input object field under construction.
#[must_use]
#[derive(Debug)]
pub struct InputFieldRef {
    field_type: FieldType,
    default_value: Option<Value>,
    description: Option<String>,
    deprecation_reason: Option<String>,
    extensions: Extensions,
}

impl InputFieldRef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            default_value: None,
            description: None,
            deprecation_reason: None,
            extensions: Extensions::new(),
        }
    }

    /// Marks the input non-null.
    pub fn required(mut self) -> Self {
        self.field_type.nullable = Some(false);
        self
    }

    /// Marks the input nullable, overriding the builder default.
    pub fn optional(mut self) -> Self {
        self.field_type.nullable = Some(true);
        self
    }

    pub fn list(mut self) -> Self {
        self.field_type.list = true;
        self
    }

    pub fn items_nullable(mut self, nullable: bool) -> Self {
        self.field_type.items_nullable = Some(nullable);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    pub fn extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub(crate) fn into_config(self, name: &str, parent_type: &str, kind: InputFieldKind) -> InputFieldConfig {
        InputFieldConfig {
            name: name.to_string(),
            parent_type: parent_type.to_string(),
            kind,
            field_type: self.field_type,
            resolved_type: None,
            default_value: self.default_value,
            description: self.description,
            deprecation_reason: self.deprecation_reason,
            extensions: self.extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expose_sets_property_resolver() {
        let t = FieldBuilder::new("User", TypeKind::Object);
        let config = t
            .expose_string("fullName")
            .description("Display name")
            .into_config("name", "User", TypeKind::Object)
            .unwrap();

        assert_eq!(config.coordinate(), "User.name");
        assert_eq!(config.field_type, FieldType::named("String"));
        assert!(config.resolver.is_some());
        assert_eq!(config.description.as_deref(), Some("Display name"));
    }

    #[test]
    fn test_field_modifiers() {
        let t = FieldBuilder::new("Query", TypeKind::Query);
        let config = t
            .field("Character")
            .list()
            .nullable(false)
            .items_nullable(true)
            .arg("episode", t.arg("Episode").required())
            .into_config("heroes", "Query", TypeKind::Query)
            .unwrap();

        assert!(config.field_type.list);
        assert_eq!(config.field_type.nullable, Some(false));
        assert_eq!(config.field_type.items_nullable, Some(true));
        let arg = &config.args["episode"];
        assert_eq!(arg.coordinate(), "Query.heroes(episode)");
        assert_eq!(arg.field_type.nullable, Some(false));
        assert!(config.resolver.is_none());
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let t = FieldBuilder::new("Query", TypeKind::Query);
        let err = t
            .string()
            .arg("id", t.arg_id())
            .arg("id", t.arg_string())
            .into_config("human", "Query", TypeKind::Query)
            .err()
            .unwrap();

        assert_eq!(err.error_code(), "DUPLICATE_FIELD");
        assert!(err.to_string().contains("Query.human"));
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_output_factory_normalizes_names() {
        let factory = output_fields(|t: &FieldBuilder| [("id", t.expose_id("id")), ("name", t.string())]);
        let FieldsFactory::Output(f) = factory else {
            panic!("expected output factory");
        };
        let fields = f(&FieldBuilder::new("Human", TypeKind::Object));
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
    }

    #[test]
    fn test_input_field_default_value() {
        let t = InputFieldBuilder::new("TreeInput");
        let config = t
            .int()
            .default_value(3)
            .into_config("depth", "TreeInput", InputFieldKind::InputField);
        assert_eq!(config.default_value, Some(Value::from(3)));
        assert_eq!(config.coordinate(), "TreeInput.depth");
    }
}
