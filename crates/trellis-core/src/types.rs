//! Deferred type and field configuration.
//!
//! These are the records stored in the [`ConfigStore`](crate::ConfigStore)
//! and passed through the plugin pipelines. Field types are still
//! [`TypeParam`]s here; the build pass fills in [`ResolvedType`] once every
//! referenced type is known.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::TypeRef;
use indexmap::IndexMap;

use crate::extensions::Extensions;
use crate::refs::{TypeKind, TypeParam};
use crate::resolve::{IsTypeOfFn, ResolveTypeFn, Resolver, Subscriber};

/// Validator for custom scalar input values.
pub type ScalarValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Declared type of a field or argument, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    /// The named type.
    pub param: TypeParam,
    /// Whether the field is a list of `param`.
    pub list: bool,
    /// Explicit nullability; the builder default applies when `None`.
    pub nullable: Option<bool>,
    /// Explicit list item nullability; the builder default applies when `None`.
    pub items_nullable: Option<bool>,
}

impl FieldType {
    /// A single value of `param`.
    pub fn named(param: impl Into<TypeParam>) -> Self {
        Self {
            param: param.into(),
            list: false,
            nullable: None,
            items_nullable: None,
        }
    }

    /// A list of `param`.
    pub fn list_of(param: impl Into<TypeParam>) -> Self {
        Self {
            list: true,
            ..Self::named(param)
        }
    }
}

/// A field type after the build pass resolved its name and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Canonical type name.
    pub name: String,
    /// Kind of the named type.
    pub kind: TypeKind,
    /// Whether the field is a list.
    pub list: bool,
    /// Whether the field itself is nullable.
    pub nullable: bool,
    /// Whether list items are nullable. Ignored for non-list fields.
    pub items_nullable: bool,
}

impl ResolvedType {
    /// Converts to the engine's type reference.
    #[must_use]
    pub fn to_type_ref(&self) -> TypeRef {
        let name = self.name.clone();
        match (self.list, self.nullable, self.items_nullable) {
            (false, true, _) => TypeRef::named(name),
            (false, false, _) => TypeRef::named_nn(name),
            (true, true, true) => TypeRef::named_list(name),
            (true, true, false) => TypeRef::named_nn_list(name),
            (true, false, true) => TypeRef::named_list_nn(name),
            (true, false, false) => TypeRef::named_nn_list_nn(name),
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item_bang = if self.items_nullable { "" } else { "!" };
        let bang = if self.nullable { "" } else { "!" };
        if self.list {
            write!(f, "[{}{item_bang}]{bang}", self.name)
        } else {
            write!(f, "{}{bang}", self.name)
        }
    }
}

/// Configuration of one output field.
#[derive(Clone)]
pub struct FieldConfig {
    /// Field name.
    pub name: String,
    /// Name of the owning type.
    pub parent_type: String,
    /// Kind of the owning type.
    pub parent_kind: TypeKind,
    /// Declared type.
    pub field_type: FieldType,
    /// Resolved type, filled in by the build pass.
    pub resolved_type: Option<ResolvedType>,
    /// Arguments in declaration order.
    pub args: IndexMap<String, InputFieldConfig>,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason; deprecated when set.
    pub deprecation_reason: Option<String>,
    /// Resolver; the default property resolver applies when `None`.
    pub resolver: Option<Resolver>,
    /// Event source for subscription fields.
    pub subscribe: Option<Subscriber>,
    /// Plugin-owned metadata.
    pub extensions: Extensions,
}

impl FieldConfig {
    /// `Type.field` coordinate.
    #[must_use]
    pub fn coordinate(&self) -> String {
        format!("{}.{}", self.parent_type, self.name)
    }

    /// Whether the field belongs to the Subscription root.
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        self.parent_kind == TypeKind::Subscription
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("parent_type", &self.parent_type)
            .field("field_type", &self.field_type)
            .field("resolved_type", &self.resolved_type)
            .field("args", &self.args)
            .field("resolver", &self.resolver.is_some())
            .field("subscribe", &self.subscribe.is_some())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Where an input field lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFieldKind {
    /// Argument of the named output field.
    Argument {
        /// Name of the output field taking the argument.
        field: String,
    },
    /// Field of an input object.
    InputField,
}

/// Configuration of an argument or input object field.
#[derive(Debug, Clone)]
pub struct InputFieldConfig {
    /// Field or argument name.
    pub name: String,
    /// Owning type name.
    pub parent_type: String,
    /// Argument or input field.
    pub kind: InputFieldKind,
    /// Declared type; `nullable: Some(false)` means required.
    pub field_type: FieldType,
    /// Resolved type, filled in by the build pass.
    pub resolved_type: Option<ResolvedType>,
    /// Default value.
    pub default_value: Option<Value>,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation_reason: Option<String>,
    /// Plugin-owned metadata.
    pub extensions: Extensions,
}

impl InputFieldConfig {
    /// `Type.field` or `Type.field(arg)` coordinate.
    #[must_use]
    pub fn coordinate(&self) -> String {
        match &self.kind {
            InputFieldKind::Argument { field } => {
                format!("{}.{}({})", self.parent_type, field, self.name)
            }
            InputFieldKind::InputField => format!("{}.{}", self.parent_type, self.name),
        }
    }
}

/// One enum value.
#[derive(Debug, Clone)]
pub struct EnumValueConfig {
    /// Value name as it appears in the schema.
    pub name: String,
    /// Owning enum name.
    pub parent_type: String,
    /// Internal value resolvers produce and receive.
    pub value: Value,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation_reason: Option<String>,
    /// Plugin-owned metadata.
    pub extensions: Extensions,
}

/// Kind-specific type options.
#[derive(Clone)]
pub enum KindOptions {
    Object {
        is_type_of: Option<IsTypeOfFn>,
    },
    Interface {
        resolve_type: Option<ResolveTypeFn>,
    },
    Union {
        members: Vec<TypeParam>,
        resolve_type: Option<ResolveTypeFn>,
    },
    Enum {
        values: IndexMap<String, EnumValueConfig>,
    },
    Scalar {
        specified_by_url: Option<String>,
        validator: Option<ScalarValidator>,
        builtin: bool,
    },
    InputObject,
    Root,
}

impl fmt::Debug for KindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { is_type_of } => f
                .debug_struct("Object")
                .field("is_type_of", &is_type_of.is_some())
                .finish(),
            Self::Interface { resolve_type } => f
                .debug_struct("Interface")
                .field("resolve_type", &resolve_type.is_some())
                .finish(),
            Self::Union {
                members,
                resolve_type,
            } => f
                .debug_struct("Union")
                .field("members", members)
                .field("resolve_type", &resolve_type.is_some())
                .finish(),
            Self::Enum { values } => f.debug_struct("Enum").field("values", values).finish(),
            Self::Scalar {
                specified_by_url,
                builtin,
                ..
            } => f
                .debug_struct("Scalar")
                .field("specified_by_url", specified_by_url)
                .field("builtin", builtin)
                .finish(),
            Self::InputObject => f.write_str("InputObject"),
            Self::Root => f.write_str("Root"),
        }
    }
}

/// Configuration of one type.
#[derive(Debug, Clone)]
pub struct TypeConfig {
    /// Type name.
    pub name: String,
    /// Type kind.
    pub kind: TypeKind,
    /// Description.
    pub description: Option<String>,
    /// Declared interfaces (objects and interfaces only).
    pub interfaces: Vec<TypeParam>,
    /// Plugin-owned metadata.
    pub extensions: Extensions,
    /// Kind-specific options.
    pub options: KindOptions,
}

impl TypeConfig {
    /// Whether this is one of the built-in scalars.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self.options, KindOptions::Scalar { builtin: true, .. })
    }

    /// The explicit discriminator, for interfaces and unions.
    #[must_use]
    pub fn resolve_type(&self) -> Option<&ResolveTypeFn> {
        match &self.options {
            KindOptions::Interface { resolve_type } | KindOptions::Union { resolve_type, .. } => {
                resolve_type.as_ref()
            }
            _ => None,
        }
    }

    /// The `is_type_of` predicate, for objects.
    #[must_use]
    pub fn is_type_of(&self) -> Option<&IsTypeOfFn> {
        match &self.options {
            KindOptions::Object { is_type_of } => is_type_of.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(list: bool, nullable: bool, items_nullable: bool) -> ResolvedType {
        ResolvedType {
            name: "Character".into(),
            kind: TypeKind::Interface,
            list,
            nullable,
            items_nullable,
        }
    }

    #[test]
    fn test_resolved_type_display() {
        assert_eq!(resolved(false, true, false).to_string(), "Character");
        assert_eq!(resolved(false, false, false).to_string(), "Character!");
        assert_eq!(resolved(true, true, false).to_string(), "[Character!]");
        assert_eq!(resolved(true, false, true).to_string(), "[Character]!");
    }

    #[test]
    fn test_resolved_type_to_type_ref() {
        assert_eq!(
            resolved(true, false, false).to_type_ref().to_string(),
            "[Character!]!"
        );
        assert_eq!(resolved(false, true, true).to_type_ref().to_string(), "Character");
    }

    #[test]
    fn test_field_type_constructors() {
        let single = FieldType::named("String");
        assert!(!single.list);
        assert_eq!(single.nullable, None);

        let list = FieldType::list_of("String");
        assert!(list.list);
        assert_eq!(list.param, TypeParam::Name("String".into()));
    }

    #[test]
    fn test_argument_coordinate() {
        let arg = InputFieldConfig {
            name: "id".into(),
            parent_type: "Query".into(),
            kind: InputFieldKind::Argument {
                field: "hero".into(),
            },
            field_type: FieldType::named("ID"),
            resolved_type: None,
            default_value: None,
            description: None,
            deprecation_reason: None,
            extensions: Extensions::new(),
        };
        assert_eq!(arg.coordinate(), "Query.hero(id)");
    }
}
