//! Per-kind type options.
//!
//! Each options struct is accepted both by the one-shot builder methods
//! (`object_type`, `enum_type`, ...) and by [`Ref::implement`]. Both paths go
//! through [`ImplementOptions::into_definition`], so they produce the same
//! stored config.
//!
//! [`Ref::implement`]: crate::Ref::implement

use std::any::Any;
use std::sync::Arc;

use async_graphql::Value;

use super::enums::EnumValues;
use super::fields::{FieldBuilder, FieldRef, FieldsFactory, InputFieldBuilder, InputFieldRef, input_fields, output_fields};
use crate::context::RequestContext;
use crate::extensions::Extensions;
use crate::refs::{TypeKind, TypeParam};
use crate::types::{KindOptions, TypeConfig};

/// A type config together with its queued field factories.
pub struct TypeDefinition {
    pub(crate) config: TypeConfig,
    pub(crate) factories: Vec<FieldsFactory>,
}

mod sealed {
    pub trait Sealed {}
}

/// Options that can implement a ref of a given kind.
pub trait ImplementOptions: sealed::Sealed + Send + 'static {
    /// Converts the options into the stored definition for `name`.
    #[doc(hidden)]
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition;
}

fn base_config(name: &str, kind: TypeKind, options: KindOptions) -> TypeConfig {
    TypeConfig {
        name: name.to_string(),
        kind,
        description: None,
        interfaces: Vec::new(),
        extensions: Extensions::new(),
        options,
    }
}

macro_rules! common_options {
    ($ty:ty) => {
        impl $ty {
            pub fn description(mut self, description: impl Into<String>) -> Self {
                self.description = Some(description.into());
                self
            }

            /// Attaches plugin metadata to the type.
            pub fn extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
                self.extensions.insert(value);
                self
            }
        }

        impl sealed::Sealed for $ty {}
    };
}

/// Options for object types.
#[derive(Default)]
#[must_use]
pub struct ObjectTypeOptions {
    description: Option<String>,
    interfaces: Vec<TypeParam>,
    is_type_of: Option<crate::IsTypeOfFn>,
    extensions: Extensions,
    fields: Vec<FieldsFactory>,
}

common_options!(ObjectTypeOptions);

impl ObjectTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an implemented interface.
    pub fn interface(mut self, interface: impl Into<TypeParam>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Predicate used by the synthesized discriminator of interfaces and
    /// unions containing this type.
    pub fn is_type_of<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.is_type_of = Some(Arc::new(f));
        self
    }

    /// Field map factory. Called only during the build pass.
    pub fn fields<F, I, K>(mut self, f: F) -> Self
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.fields.push(output_fields(f));
        self
    }
}

impl ImplementOptions for ObjectTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(
            name,
            kind,
            KindOptions::Object {
                is_type_of: self.is_type_of,
            },
        );
        config.description = self.description;
        config.interfaces = self.interfaces;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: self.fields,
        }
    }
}

/// Options for interface types.
#[derive(Default)]
#[must_use]
pub struct InterfaceTypeOptions {
    description: Option<String>,
    interfaces: Vec<TypeParam>,
    resolve_type: Option<crate::ResolveTypeFn>,
    extensions: Extensions,
    fields: Vec<FieldsFactory>,
}

common_options!(InterfaceTypeOptions);

impl InterfaceTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an interface this interface extends.
    pub fn interface(mut self, interface: impl Into<TypeParam>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Explicit discriminator. Without one, the build pass synthesizes it from
    /// the implementers.
    pub fn resolve_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.resolve_type = Some(Arc::new(f));
        self
    }

    pub fn fields<F, I, K>(mut self, f: F) -> Self
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.fields.push(output_fields(f));
        self
    }
}

impl ImplementOptions for InterfaceTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(
            name,
            kind,
            KindOptions::Interface {
                resolve_type: self.resolve_type,
            },
        );
        config.description = self.description;
        config.interfaces = self.interfaces;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: self.fields,
        }
    }
}

/// Options for union types.
#[derive(Default)]
#[must_use]
pub struct UnionTypeOptions {
    description: Option<String>,
    members: Vec<TypeParam>,
    resolve_type: Option<crate::ResolveTypeFn>,
    extensions: Extensions,
}

common_options!(UnionTypeOptions);

impl UnionTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member object type.
    pub fn member(mut self, member: impl Into<TypeParam>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn resolve_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.resolve_type = Some(Arc::new(f));
        self
    }
}

impl ImplementOptions for UnionTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(
            name,
            kind,
            KindOptions::Union {
                members: self.members,
                resolve_type: self.resolve_type,
            },
        );
        config.description = self.description;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: Vec::new(),
        }
    }
}

/// Options for enum types.
#[derive(Default)]
#[must_use]
pub struct EnumTypeOptions {
    description: Option<String>,
    values: EnumValues,
    extensions: Extensions,
}

common_options!(EnumTypeOptions);

impl EnumTypeOptions {
    pub fn new(values: impl Into<EnumValues>) -> Self {
        Self {
            values: values.into(),
            ..Self::default()
        }
    }
}

impl ImplementOptions for EnumTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(
            name,
            kind,
            KindOptions::Enum {
                values: self.values.into_configs(name),
            },
        );
        config.description = self.description;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: Vec::new(),
        }
    }
}

/// Options for custom scalars.
#[derive(Default)]
#[must_use]
pub struct ScalarTypeOptions {
    description: Option<String>,
    specified_by_url: Option<String>,
    validator: Option<crate::types::ScalarValidator>,
    extensions: Extensions,
}

common_options!(ScalarTypeOptions);

impl ScalarTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    /// Rejects input values for which `f` returns false.
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }
}

impl ImplementOptions for ScalarTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(
            name,
            kind,
            KindOptions::Scalar {
                specified_by_url: self.specified_by_url,
                validator: self.validator,
                builtin: false,
            },
        );
        config.description = self.description;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: Vec::new(),
        }
    }
}

/// Options for input object types.
#[derive(Default)]
#[must_use]
pub struct InputTypeOptions {
    description: Option<String>,
    extensions: Extensions,
    fields: Vec<FieldsFactory>,
}

common_options!(InputTypeOptions);

impl InputTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<F, I, K>(mut self, f: F) -> Self
    where
        F: FnOnce(&InputFieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, InputFieldRef)>,
        K: Into<String>,
    {
        self.fields.push(input_fields(f));
        self
    }
}

impl ImplementOptions for InputTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(name, kind, KindOptions::InputObject);
        config.description = self.description;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: self.fields,
        }
    }
}

/// Options for the Query, Mutation and Subscription root types.
#[derive(Default)]
#[must_use]
pub struct RootTypeOptions {
    description: Option<String>,
    extensions: Extensions,
    fields: Vec<FieldsFactory>,
}

common_options!(RootTypeOptions);

impl RootTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<F, I, K>(mut self, f: F) -> Self
    where
        F: FnOnce(&FieldBuilder) -> I + Send + 'static,
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        self.fields.push(output_fields(f));
        self
    }
}

impl ImplementOptions for RootTypeOptions {
    fn into_definition(self, name: &str, kind: TypeKind) -> TypeDefinition {
        let mut config = base_config(name, kind, KindOptions::Root);
        config.description = self.description;
        config.extensions = self.extensions;
        TypeDefinition {
            config,
            factories: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_definition() {
        let def = ObjectTypeOptions::new()
            .description("A human")
            .interface("Character")
            .is_type_of(|v| matches!(v, Value::Object(_)))
            .fields(|t| [("name", t.expose_string("name"))])
            .into_definition("Human", TypeKind::Object);

        assert_eq!(def.config.name, "Human");
        assert_eq!(def.config.interfaces, vec![TypeParam::from("Character")]);
        assert!(def.config.is_type_of().is_some());
        assert_eq!(def.factories.len(), 1);
    }

    #[test]
    fn test_enum_definition_normalizes_values() {
        let def = EnumTypeOptions::new(["NEWHOPE", "EMPIRE", "JEDI"])
            .into_definition("Episode", TypeKind::Enum);
        let KindOptions::Enum { values } = &def.config.options else {
            panic!("expected enum options");
        };
        assert_eq!(values.len(), 3);
        assert_eq!(values["JEDI"].value, Value::String("JEDI".into()));
    }

    #[test]
    fn test_union_members_keep_order() {
        let def = UnionTypeOptions::new()
            .member("Human")
            .member("Droid")
            .into_definition("SearchResult", TypeKind::Union);
        let KindOptions::Union { members, resolve_type } = &def.config.options else {
            panic!("expected union options");
        };
        assert_eq!(members, &vec![TypeParam::from("Human"), TypeParam::from("Droid")]);
        assert!(resolve_type.is_none());
    }
}
