//! # trellis-plugins
//!
//! Built-in plugins for the trellis schema builder, and Relay helpers.
//!
//! - [`trace`] - Spans and slow/failed resolver warnings
//! - [`scope_auth`] - Scope-based field authorization
//! - [`visibility`] - Feature-flagged fields and enum values
//! - [`relay`] - Connections, global IDs and relay mutations
//!
//! Plugins are selected by name in the builder options:
//!
//! ```ignore
//! let options = BuilderOptions::from_toml_str(r#"
//!     plugins = ["tracing", "scopeAuth"]
//!
//!     [scopeAuth]
//!     unauthorized_as_null = true
//! "#)?;
//! let builder = SchemaBuilder::with_registry(options, builtin_registry());
//! ```

pub mod relay;
pub mod scope_auth;
pub mod trace;
pub mod visibility;

pub use relay::{
    ConnectionArgs, GlobalId, RelayBuilderExt, array_connection, decode_cursor, decode_global_id,
    encode_cursor, encode_global_id, resolve_array_connection, with_connection_args,
};
pub use scope_auth::{AuthScopes, GrantedScopes, ScopeAuthOptions, ScopeAuthPlugin, SkipTypeScopes};
pub use trace::{Traced, TracingOptions, TracingPlugin};
pub use visibility::{Visibility, VisibilityOptions, VisibilityPlugin};

use trellis_core::PluginRegistry;

/// A registry with every built-in plugin under its conventional name.
#[must_use]
pub fn builtin_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with(trace::NAME, TracingPlugin::factory)
        .with(scope_auth::NAME, ScopeAuthPlugin::factory)
        .with(visibility::NAME, VisibilityPlugin::factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = builtin_registry();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["tracing", "scopeAuth", "visibility"]
        );
    }
}
