//! Name-based plugin registry.
//!
//! Each builder owns its registry, so two builders in one process never see
//! each other's plugins.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Plugin;
use crate::config::BuilderOptions;
use crate::error::SchemaError;
use crate::Result;

/// Input handed to a plugin factory.
#[derive(Debug, Clone, Copy)]
pub struct PluginInit<'a> {
    /// Name the plugin was requested under.
    pub name: &'a str,
    /// The plugin's option block, `Null` when absent.
    pub options: &'a serde_json::Value,
    /// The whole builder configuration.
    pub builder_options: &'a BuilderOptions,
}

impl PluginInit<'_> {
    /// Deserializes the option block, falling back to `T::default()` when
    /// there is none.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::PluginOptions`] if the block does not match `T`.
    pub fn parse_options<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.options.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.options.clone())
            .map_err(|e| SchemaError::plugin_options(self.name, e.to_string()))
    }
}

/// Constructs a plugin instance for one build.
pub type PluginFactory = Arc<dyn Fn(&PluginInit<'_>) -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// Maps plugin names to factories.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: IndexMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PluginInit<'_>) -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(plugin = %name, "Registered plugin factory");
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginInit<'_>) -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiates the named plugin.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownPlugin`] if `name` is not registered, or
    /// whatever the factory returns.
    pub fn instantiate(&self, name: &str, options: &BuilderOptions) -> Result<Arc<dyn Plugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchemaError::UnknownPlugin {
                name: name.to_string(),
            })?;
        let block = options.plugin_options(name);
        factory(&PluginInit {
            name,
            options: &block,
            builder_options: options,
        })
    }

    /// Instantiates every plugin listed in `options.plugins`, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first unknown plugin or failing factory.
    pub fn instantiate_all(&self, options: &BuilderOptions) -> Result<Vec<Arc<dyn Plugin>>> {
        options
            .plugins
            .iter()
            .map(|name| self.instantiate(name, options))
            .collect()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct LimitOptions {
        limit: u32,
    }

    struct Limit(#[allow(dead_code)] u32);

    impl Plugin for Limit {
        fn name(&self) -> &str {
            "limit"
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new().with("limit", |init| {
            let options: LimitOptions = init.parse_options()?;
            Ok(Arc::new(Limit(options.limit)) as Arc<dyn Plugin>)
        })
    }

    #[test]
    fn test_instantiate_in_option_order() {
        let options = BuilderOptions::from_toml_str("plugins = [\"limit\"]\n[limit]\nlimit = 3\n").unwrap();
        let plugins = registry().instantiate_all(&options).unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), "limit");
    }

    #[test]
    fn test_unknown_plugin() {
        let options = BuilderOptions::default().with_plugin("missing");
        let err = registry().instantiate_all(&options).err().unwrap();
        assert!(matches!(err, SchemaError::UnknownPlugin { ref name } if name == "missing"));
    }

    #[test]
    fn test_invalid_plugin_options() {
        let options = BuilderOptions::from_toml_str("[limit]\nlimit = \"many\"\n").unwrap();
        let err = registry().instantiate("limit", &options).err().unwrap();
        assert_eq!(err.error_code(), "PLUGIN_OPTIONS");
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = registry();
        let b = PluginRegistry::new();
        assert!(a.contains("limit"));
        assert!(!b.contains("limit"));
        assert_eq!(a.names().collect::<Vec<_>>(), ["limit"]);
    }
}
