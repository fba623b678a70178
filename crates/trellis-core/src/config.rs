//! Builder configuration.
//!
//! Options can be constructed in code or loaded from TOML. Keys the core does
//! not recognise are kept as per-plugin option blocks, keyed by plugin name,
//! so plugins loaded at runtime can validate their own settings.
//!
//! # Example Configuration
//!
//! ```toml
//! default_field_nullability = true
//! plugins = ["tracing", "scopeAuth"]
//!
//! [relay]
//! cursor_field_name = "cursor"
//! client_mutation_id = "optional"
//!
//! [limits]
//! max_depth = 15
//!
//! [scopeAuth]
//! require_mutation_scopes = true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Schema builder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderOptions {
    /// Whether output fields are nullable when a field does not say.
    /// Default: true
    #[serde(default = "default_field_nullability")]
    pub default_field_nullability: bool,

    /// Whether list items of output fields are nullable when a field does not say.
    /// Default: false
    #[serde(default)]
    pub default_list_item_nullability: bool,

    /// Whether input fields and arguments are required when they do not say.
    /// Default: false
    #[serde(default)]
    pub default_input_field_required: bool,

    /// Plugin names, resolved against the builder's registry in this order.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Relay-style connection options.
    #[serde(default)]
    pub relay: RelayOptions,

    /// Limits forwarded to the execution engine.
    #[serde(default)]
    pub limits: EngineLimits,

    /// Option blocks owned by plugins, keyed by plugin name.
    #[serde(flatten)]
    pub plugin_options: serde_json::Map<String, serde_json::Value>,
}

fn default_field_nullability() -> bool {
    true
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            default_field_nullability: default_field_nullability(),
            default_list_item_nullability: false,
            default_input_field_required: false,
            plugins: Vec::new(),
            relay: RelayOptions::default(),
            limits: EngineLimits::default(),
            plugin_options: serde_json::Map::new(),
        }
    }
}

impl BuilderOptions {
    /// Parses options from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Config`] if the document is malformed or fails
    /// [`validate`](Self::validate).
    pub fn from_toml_str(toml: &str) -> Result<Self, SchemaError> {
        let options: Self = toml::from_str(toml)?;
        options.validate()?;
        Ok(options)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.limits.max_depth == Some(0) {
            return Err(SchemaError::Config("limits.max_depth must be > 0".into()));
        }
        if self.limits.max_complexity == Some(0) {
            return Err(SchemaError::Config(
                "limits.max_complexity must be > 0".into(),
            ));
        }
        if !crate::refs::is_valid_graphql_name(&self.relay.cursor_field_name) {
            return Err(SchemaError::Config(format!(
                "relay.cursor_field_name `{}` is not a valid GraphQL name",
                self.relay.cursor_field_name
            )));
        }
        if !crate::refs::is_valid_graphql_name(&self.relay.page_info_type_name) {
            return Err(SchemaError::Config(format!(
                "relay.page_info_type_name `{}` is not a valid GraphQL name",
                self.relay.page_info_type_name
            )));
        }
        for (i, name) in self.plugins.iter().enumerate() {
            if self.plugins[..i].contains(name) {
                return Err(SchemaError::Config(format!(
                    "plugin `{name}` is listed more than once"
                )));
            }
        }
        Ok(())
    }

    /// Returns the option block for `plugin`, or `Null` if there is none.
    #[must_use]
    pub fn plugin_options(&self, plugin: &str) -> serde_json::Value {
        self.plugin_options
            .get(plugin)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    /// Builder-style helper appending a plugin name.
    #[must_use]
    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugins.push(name.into());
        self
    }
}

/// Relay connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayOptions {
    /// Name of the cursor field on edge types.
    /// Default: "cursor"
    #[serde(default = "default_cursor_field_name")]
    pub cursor_field_name: String,

    /// Name of the shared page info type.
    /// Default: "PageInfo"
    #[serde(default = "default_page_info_type_name")]
    pub page_info_type_name: String,

    /// Whether relay mutation inputs carry `clientMutationId`.
    /// Default: optional
    #[serde(default)]
    pub client_mutation_id: ClientMutationId,
}

fn default_cursor_field_name() -> String {
    "cursor".to_string()
}

fn default_page_info_type_name() -> String {
    "PageInfo".to_string()
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            cursor_field_name: default_cursor_field_name(),
            page_info_type_name: default_page_info_type_name(),
            client_mutation_id: ClientMutationId::default(),
        }
    }
}

/// Inclusion policy for `clientMutationId` on relay mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMutationId {
    /// Field is not generated.
    Omit,
    /// Field is generated as nullable.
    #[default]
    Optional,
    /// Field is generated as non-null.
    Required,
}

/// Execution limits applied to the built schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Maximum query depth, unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum query complexity, unlimited when absent.
    #[serde(default)]
    pub max_complexity: Option<usize>,

    /// Enable introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

fn default_introspection() -> bool {
    true
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_complexity: None,
            introspection: default_introspection(),
        }
    }
}
