//! Schema construction and execution.
//!
//! - [`build`] links the stored configuration and runs the plugin chain
//! - `lower` translates the result into an async-graphql dynamic schema
//! - [`LazySchema`] defers building until first use

mod build;
mod input_shape;
mod lazy;
mod lower;

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Response};
use futures_util::Stream;
use indexmap::IndexMap;

pub(crate) use build::build;
pub use input_shape::{EnumMapping, InputShape, InputShapes};
pub use lazy::{BuilderFactory, LazySchema, SchemaState};

use crate::context::RequestContext;
use crate::types::{FieldConfig, TypeConfig};

type TypeEntry = (TypeConfig, IndexMap<String, FieldConfig>);

/// An executable schema together with the final configuration it was lowered
/// from.
#[derive(Clone)]
pub struct BuiltSchema {
    schema: Schema,
    shapes: Arc<InputShapes>,
    types: Arc<IndexMap<String, TypeEntry>>,
}

impl BuiltSchema {
    pub(crate) fn new(schema: Schema, shapes: Arc<InputShapes>, types: IndexMap<String, TypeEntry>) -> Self {
        Self {
            schema,
            shapes,
            types: Arc::new(types),
        }
    }

    /// Schema in SDL form. Types appear in a stable order, so two builds of
    /// the same definitions print the same document.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    /// Executes a query or mutation with `ctx` available to every resolver.
    pub async fn execute(&self, request: impl Into<Request>, ctx: RequestContext) -> Response {
        self.schema.execute(request.into().data(ctx)).await
    }

    /// Executes a subscription, yielding one response per event.
    pub fn execute_stream(
        &self,
        request: impl Into<Request>,
        ctx: RequestContext,
    ) -> impl Stream<Item = Response> + Send + '_ {
        self.schema.execute_stream(request.into().data(ctx))
    }

    /// Input coercion shapes, including which input objects are recursive.
    #[must_use]
    pub fn input_shapes(&self) -> &InputShapes {
        &self.shapes
    }

    /// Final configuration of a type, after every plugin ran.
    #[must_use]
    pub fn type_config(&self, name: &str) -> Option<&TypeConfig> {
        self.types.get(name).map(|(config, _)| config)
    }

    /// Final configuration of an output field.
    #[must_use]
    pub fn field_config(&self, type_name: &str, field: &str) -> Option<&FieldConfig> {
        self.types
            .get(type_name)
            .and_then(|(_, fields)| fields.get(field))
    }

    /// Output fields of a type, in declaration order.
    pub fn fields(&self, type_name: &str) -> impl Iterator<Item = &FieldConfig> {
        self.types
            .get(type_name)
            .into_iter()
            .flat_map(|(_, fields)| fields.values())
    }

    /// Names of every user-defined type, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The underlying engine schema.
    #[must_use]
    pub fn inner(&self) -> &Schema {
        &self.schema
    }
}

impl std::fmt::Debug for BuiltSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltSchema")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
