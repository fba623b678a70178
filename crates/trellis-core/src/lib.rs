//! # trellis-core
//!
//! Deferred, plugin-extensible GraphQL schema builder.
//!
//! Types are declared through typed refs and configured lazily: a field may
//! name a type that is registered later, and field maps are only evaluated
//! when the schema is built. A chain of plugins can then rewrite every type,
//! field and enum value, and wrap every resolver, before the result is
//! lowered into an [`async_graphql::dynamic::Schema`].
//!
//! ## Overview
//!
//! ```ignore
//! let mut builder = SchemaBuilder::default();
//!
//! let character = builder.interface_type(
//!     "Character",
//!     InterfaceTypeOptions::new().fields(|t| [("name", t.expose_string("name"))]),
//! )?;
//! builder.object_type("Human", ObjectTypeOptions::new().interface(&character))?;
//! builder.query_field("hero", |t| {
//!     t.field(&character).resolve(|_| async { Ok(data::luke()) })
//! })?;
//!
//! let schema = builder.build()?;
//! let response = schema.execute("{ hero { name } }", RequestContext::new()).await;
//! ```
//!
//! ## Modules
//!
//! - [`refs`] - Typed type handles and type parameters
//! - [`store`] - Deferred configuration store
//! - [`builder`] - The definition API
//! - [`plugin`] - Plugin trait and registry
//! - [`schema`] - Build pass, lowering and lazy schemas
//! - [`config`] - Builder options
//! - [`error`] - Error types

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod extensions;
pub mod plugin;
pub mod refs;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod types;

pub use async_graphql::Value;
pub use builder::{
    EnumTypeOptions, EnumValueOptions, EnumValues, FieldBuilder, FieldRef, InputFieldBuilder,
    InputFieldRef, InputTypeOptions, InterfaceTypeOptions, ObjectTypeOptions, RootTypeOptions,
    ScalarTypeOptions, SchemaBuilder, UnionTypeOptions,
};
pub use config::{BuilderOptions, ClientMutationId, EngineLimits, RelayOptions};
pub use context::{RequestContext, RequestData};
pub use error::SchemaError;
pub use extensions::Extensions;
pub use plugin::{Plugin, PluginFactory, PluginHandle, PluginInit, PluginRegistry};
pub use refs::{
    AnyRef, EnumRef, InputRef, InterfaceRef, ObjectRef, Ref, RefId, RefKind, ScalarRef, TypeKind,
    TypeParam, UnionRef, scalars,
};
pub use resolve::{
    EventStream, IsTypeOfFn, ResolveInfo, ResolveParams, ResolveResult, ResolveTypeFn, Resolver,
    Subscriber, identity_resolver, json_to_value, property_resolver, resolver, subscriber,
};
pub use schema::{BuiltSchema, LazySchema, SchemaState};
pub use store::ConfigStore;
pub use types::{
    EnumValueConfig, FieldConfig, FieldType, InputFieldConfig, InputFieldKind, KindOptions,
    ResolvedType, TypeConfig,
};

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
