//! Identity-based handles for types that may not be defined yet.
//!
//! A [`Ref`] is an index into the [`ConfigStore`] arena plus a name and a kind
//! tag. Creating a ref never touches the store's name table: two refs created
//! with the same name are distinct and only collide if both get implemented.
//!
//! [`ConfigStore`]: crate::ConfigStore

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::builder::{
    EnumTypeOptions, ImplementOptions, InputTypeOptions, InterfaceTypeOptions,
    ObjectTypeOptions, ScalarTypeOptions, UnionTypeOptions,
};
use crate::{Result, SchemaBuilder};

/// The kind of a GraphQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Enum,
    Scalar,
    InputObject,
    Query,
    Mutation,
    Subscription,
}

impl TypeKind {
    /// Object types and the three root operation types.
    #[must_use]
    pub fn is_object_like(self) -> bool {
        matches!(
            self,
            Self::Object | Self::Query | Self::Mutation | Self::Subscription
        )
    }

    /// Whether a type of this kind may be used as a field or argument input.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::Scalar | Self::Enum | Self::InputObject)
    }

    /// Whether a type of this kind may be returned by an output field.
    #[must_use]
    pub fn is_output(self) -> bool {
        !matches!(self, Self::InputObject)
    }

    /// Interfaces and unions need a discriminator at request time.
    #[must_use]
    pub fn is_abstract(self) -> bool {
        matches!(self, Self::Interface | Self::Union)
    }

    /// Whether the type carries output fields.
    #[must_use]
    pub fn has_fields(self) -> bool {
        self.is_object_like() || self == Self::Interface
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Object => "object",
            Self::Interface => "interface",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Scalar => "scalar",
            Self::InputObject => "input object",
            Self::Query => "query root",
            Self::Mutation => "mutation root",
            Self::Subscription => "subscription root",
        };
        f.write_str(s)
    }
}

/// Arena index of a ref inside a [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub(crate) usize);

impl RefId {
    /// The raw arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker trait tying a ref kind to the options that implement it.
pub trait RefKind: sealed::Sealed + 'static {
    /// The kind tag stored in the arena.
    const KIND: TypeKind;
    /// Options accepted by [`Ref::implement`].
    type Options: ImplementOptions;
}

macro_rules! ref_kind {
    ($(#[$doc:meta])* $marker:ident, $alias:ident, $kind:ident, $options:ty) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $marker {}

        impl sealed::Sealed for $marker {}

        impl RefKind for $marker {
            const KIND: TypeKind = TypeKind::$kind;
            type Options = $options;
        }

        $(#[$doc])*
        pub type $alias = Ref<$marker>;
    };
}

ref_kind!(
    /// Ref to an object type.
    ObjectKind, ObjectRef, Object, ObjectTypeOptions
);
ref_kind!(
    /// Ref to an interface type.
    InterfaceKind, InterfaceRef, Interface, InterfaceTypeOptions
);
ref_kind!(
    /// Ref to a union type.
    UnionKind, UnionRef, Union, UnionTypeOptions
);
ref_kind!(
    /// Ref to an enum type.
    EnumKind, EnumRef, Enum, EnumTypeOptions
);
ref_kind!(
    /// Ref to a custom scalar type.
    ScalarKind, ScalarRef, Scalar, ScalarTypeOptions
);
ref_kind!(
    /// Ref to an input object type.
    InputKind, InputRef, InputObject, InputTypeOptions
);

/// Typed handle to a (possibly not yet implemented) type.
pub struct Ref<K> {
    id: RefId,
    name: Arc<str>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: RefKind> Ref<K> {
    pub(crate) fn new(id: RefId, name: Arc<str>) -> Self {
        Self {
            id,
            name,
            _kind: PhantomData,
        }
    }

    /// Arena id of this ref.
    #[must_use]
    pub fn id(&self) -> RefId {
        self.id
    }

    /// The type name this ref will be registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of type this ref stands for.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        K::KIND
    }

    /// Supplies the definition for a ref created without one.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateImplementation`] if the ref was already
    /// implemented and [`SchemaError::DuplicateTypeName`] if another ref owns
    /// the name.
    ///
    /// [`SchemaError::DuplicateImplementation`]: crate::SchemaError::DuplicateImplementation
    /// [`SchemaError::DuplicateTypeName`]: crate::SchemaError::DuplicateTypeName
    pub fn implement(&self, builder: &mut SchemaBuilder, options: K::Options) -> Result<Self> {
        builder.implement(self, options)?;
        Ok(self.clone())
    }

    /// Drops the static kind.
    #[must_use]
    pub fn erase(&self) -> AnyRef {
        AnyRef {
            id: self.id,
            kind: K::KIND,
            name: Arc::clone(&self.name),
        }
    }
}

impl<K> Clone for Ref<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            _kind: PhantomData,
        }
    }
}

impl<K> PartialEq for Ref<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Ref<K> {}

impl<K> fmt::Debug for Ref<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// A ref with its kind carried at runtime.
#[derive(Debug, Clone)]
pub struct AnyRef {
    pub(crate) id: RefId,
    pub(crate) kind: TypeKind,
    pub(crate) name: Arc<str>,
}

impl AnyRef {
    /// Arena id.
    #[must_use]
    pub fn id(&self) -> RefId {
        self.id
    }

    /// Kind tag.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for AnyRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnyRef {}

/// Anything a field may name as its type.
///
/// Resolution to a canonical ref happens only during the build pass, so a
/// parameter may point at a type that is registered later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeParam {
    /// A type name, including built-in scalars.
    Name(String),
    /// A ref handle.
    Ref(RefId),
    /// A Rust type associated with a ref through
    /// [`SchemaBuilder::associate`](crate::SchemaBuilder::associate).
    Rust {
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl TypeParam {
    /// Parameter for a Rust type previously associated with a ref.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self::Rust {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Ref(id) => write!(f, "{id}"),
            Self::Rust { type_name, .. } => f.write_str(type_name),
        }
    }
}

impl From<&str> for TypeParam {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for TypeParam {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl<K> From<&Ref<K>> for TypeParam {
    fn from(r: &Ref<K>) -> Self {
        Self::Ref(r.id)
    }
}

impl<K> From<Ref<K>> for TypeParam {
    fn from(r: Ref<K>) -> Self {
        Self::Ref(r.id)
    }
}

impl From<&AnyRef> for TypeParam {
    fn from(r: &AnyRef) -> Self {
        Self::Ref(r.id)
    }
}

/// Names of the scalars every schema provides.
pub mod scalars {
    pub const STRING: &str = "String";
    pub const INT: &str = "Int";
    pub const FLOAT: &str = "Float";
    pub const BOOLEAN: &str = "Boolean";
    pub const ID: &str = "ID";

    /// All built-in scalar names, in registration order.
    pub const BUILTIN: [&str; 5] = [STRING, INT, FLOAT, BOOLEAN, ID];
}

/// Checks that a name matches `/[_A-Za-z][_0-9A-Za-z]*/` and does not use the
/// reserved `__` prefix.
#[must_use]
pub fn is_valid_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }
    if name.starts_with("__") {
        return false;
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refs_compare_by_identity() {
        let a: ObjectRef = Ref::new(RefId(1), Arc::from("User"));
        let b: ObjectRef = Ref::new(RefId(2), Arc::from("User"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.kind(), TypeKind::Object);
    }

    #[test]
    fn test_type_param_conversions() {
        let r: InterfaceRef = Ref::new(RefId(7), Arc::from("Node"));
        assert_eq!(TypeParam::from(&r), TypeParam::Ref(RefId(7)));
        assert_eq!(TypeParam::from("Int"), TypeParam::Name("Int".into()));

        struct Marker;
        assert_eq!(TypeParam::of::<Marker>(), TypeParam::of::<Marker>());
        assert_ne!(TypeParam::of::<Marker>(), TypeParam::of::<String>());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(TypeKind::Query.is_object_like());
        assert!(TypeKind::InputObject.is_input());
        assert!(!TypeKind::InputObject.is_output());
        assert!(TypeKind::Union.is_abstract());
        assert!(!TypeKind::Union.has_fields());
        assert!(TypeKind::Interface.has_fields());
    }

    #[test]
    fn test_valid_graphql_names() {
        assert!(is_valid_graphql_name("User"));
        assert!(is_valid_graphql_name("_private"));
        assert!(is_valid_graphql_name("Patient_Contact2"));
        assert!(!is_valid_graphql_name(""));
        assert!(!is_valid_graphql_name("2fast"));
        assert!(!is_valid_graphql_name("us-core"));
        assert!(!is_valid_graphql_name("__Type"));
    }
}
