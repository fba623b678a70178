//! Error types for schema definition and construction.
//!
//! Every error raised here is a programming error: definition-time errors are
//! returned from builder calls, build-time errors from [`SchemaBuilder::build`].
//! Both are meant to fail fast during startup or tests. Request-time failures
//! never use this type; they surface as [`async_graphql::Error`] values from
//! resolvers and are handled by the execution engine.
//!
//! [`SchemaBuilder::build`]: crate::SchemaBuilder::build

use crate::refs::TypeKind;

/// Errors raised while defining or building a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two distinct refs were implemented under the same type name.
    #[error("Duplicate type name `{name}`: a different type is already registered under this name")]
    DuplicateTypeName {
        /// The contested type name.
        name: String,
    },

    /// `implement` was called twice on the same ref.
    #[error("Type `{name}` has already been implemented")]
    DuplicateImplementation {
        /// Name of the ref.
        name: String,
    },

    /// A ref was referenced from the schema but never implemented.
    #[error("Ref `{name}` was referenced by `{referenced_by}` but never implemented")]
    UnimplementedRef {
        /// Name of the ref.
        name: String,
        /// Type or field coordinate that referenced it.
        referenced_by: String,
    },

    /// A type was found but is not of the expected kind.
    #[error("Type `{name}` has kind {actual}, expected {expected}")]
    TypeKindMismatch {
        /// The type name.
        name: String,
        /// What the caller expected.
        expected: String,
        /// What was registered.
        actual: TypeKind,
    },

    /// A field name was declared twice on the same type.
    #[error("Duplicate field `{field}` on type `{type_name}`")]
    DuplicateField {
        /// The owning type.
        type_name: String,
        /// The repeated field name.
        field: String,
    },

    /// The config store was mutated after the build phase started.
    #[error("Cannot register `{name}`: the config store is frozen")]
    StoreFrozen {
        /// Name of the type being registered.
        name: String,
    },

    /// A field or member refers to a type name that was never registered.
    #[error("Unknown type `{name}` referenced by `{referenced_by}`")]
    MissingType {
        /// The unknown name.
        name: String,
        /// Type or field coordinate that referenced it.
        referenced_by: String,
    },

    /// A field's declared type is not usable in its position.
    #[error("Invalid type for `{coordinate}`: {reason}")]
    InvalidFieldType {
        /// `Type.field` or `Type.field(arg)` coordinate.
        coordinate: String,
        /// Human readable explanation.
        reason: String,
    },

    /// A type or field name is not a valid GraphQL name.
    #[error("Invalid GraphQL name `{name}`")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// No Query type was registered before build.
    #[error("Schema has no Query type")]
    MissingQueryType,

    /// A plugin name from the options is not present in the registry.
    #[error("Unknown plugin `{name}`")]
    UnknownPlugin {
        /// The unresolved plugin name.
        name: String,
    },

    /// A plugin rejected its option block.
    #[error("Invalid options for plugin `{plugin}`: {message}")]
    PluginOptions {
        /// Plugin name.
        plugin: String,
        /// Validation message.
        message: String,
    },

    /// A plugin hook failed during the build pass.
    #[error("Plugin `{plugin}` failed: {message}")]
    Plugin {
        /// Plugin name.
        plugin: String,
        /// Failure message, naming the offending type or field.
        message: String,
    },

    /// Builder configuration could not be parsed or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The execution engine rejected the lowered schema.
    #[error("Schema engine error: {0}")]
    Engine(String),

    /// A lazily built schema is still being built by another caller.
    #[error("Schema is initializing, retry shortly")]
    SchemaInitializing,

    /// A lazily built schema failed to build earlier.
    #[error("Schema build failed: {0}")]
    BuildFailed(String),
}

impl SchemaError {
    /// Creates a [`SchemaError::Plugin`] error.
    #[must_use]
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Creates a [`SchemaError::PluginOptions`] error.
    #[must_use]
    pub fn plugin_options(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginOptions {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Returns the error code, stable across releases.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateTypeName { .. } => "DUPLICATE_TYPE_NAME",
            Self::DuplicateImplementation { .. } => "DUPLICATE_IMPLEMENTATION",
            Self::UnimplementedRef { .. } => "UNIMPLEMENTED_REF",
            Self::TypeKindMismatch { .. } => "TYPE_KIND_MISMATCH",
            Self::DuplicateField { .. } => "DUPLICATE_FIELD",
            Self::StoreFrozen { .. } => "STORE_FROZEN",
            Self::MissingType { .. } => "MISSING_TYPE",
            Self::InvalidFieldType { .. } => "INVALID_FIELD_TYPE",
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::MissingQueryType => "MISSING_QUERY_TYPE",
            Self::UnknownPlugin { .. } => "UNKNOWN_PLUGIN",
            Self::PluginOptions { .. } => "PLUGIN_OPTIONS",
            Self::Plugin { .. } => "PLUGIN_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::SchemaInitializing => "SCHEMA_INITIALIZING",
            Self::BuildFailed(_) => "BUILD_FAILED",
        }
    }

    /// Returns whether the error was raised by a definition-phase builder call
    /// rather than by the build pass.
    #[must_use]
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTypeName { .. }
                | Self::DuplicateImplementation { .. }
                | Self::StoreFrozen { .. }
                | Self::InvalidName { .. }
        )
    }
}

impl From<toml::de::Error> for SchemaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_type() {
        let err = SchemaError::DuplicateTypeName {
            name: "User".into(),
        };
        assert!(err.to_string().contains("`User`"));

        let err = SchemaError::MissingType {
            name: "Ghost".into(),
            referenced_by: "Query.ghost".into(),
        };
        assert!(err.to_string().contains("Ghost"));
        assert!(err.to_string().contains("Query.ghost"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SchemaError::MissingQueryType.error_code(), "MISSING_QUERY_TYPE");
        assert_eq!(
            SchemaError::plugin("scopeAuth", "boom").error_code(),
            "PLUGIN_FAILED"
        );
    }

    #[test]
    fn test_kind_mismatch_message() {
        let err = SchemaError::TypeKindMismatch {
            name: "Tree".into(),
            expected: "an output type".into(),
            actual: TypeKind::InputObject,
        };
        assert_eq!(
            err.to_string(),
            "Type `Tree` has kind input object, expected an output type"
        );
    }

    #[test]
    fn test_definition_errors() {
        assert!(
            SchemaError::DuplicateImplementation { name: "A".into() }.is_definition_error()
        );
        assert!(!SchemaError::MissingQueryType.is_definition_error());
    }
}
