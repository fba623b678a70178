//! Feature-flag visibility.
//!
//! Fields, arguments, input fields and enum values marked with
//! [`Visibility`] are removed from the schema unless their flag is listed in
//! `enabled`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use trellis_core::{
    EnumValueConfig, Extensions, FieldConfig, InputFieldConfig, Plugin, PluginInit,
};

/// Registry name.
pub const NAME: &str = "visibility";

/// Marks a schema element as visible only under `flag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub flag: String,
}

impl Visibility {
    pub fn flag(flag: impl Into<String>) -> Self {
        Self { flag: flag.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityOptions {
    /// Flags whose elements stay in the schema.
    pub enabled: Vec<String>,
}

#[derive(Debug, Default)]
pub struct VisibilityPlugin {
    enabled: HashSet<String>,
}

impl VisibilityPlugin {
    #[must_use]
    pub fn new(options: VisibilityOptions) -> Self {
        Self {
            enabled: options.enabled.into_iter().collect(),
        }
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Fails if the `[visibility]` option block is malformed.
    pub fn factory(init: &PluginInit<'_>) -> trellis_core::Result<Arc<dyn Plugin>> {
        let options: VisibilityOptions = init.parse_options()?;
        Ok(Arc::new(Self::new(options)))
    }

    fn hidden<'a>(&self, extensions: &'a Extensions) -> Option<&'a str> {
        extensions
            .get::<Visibility>()
            .filter(|v| !self.enabled.contains(&v.flag))
            .map(|v| v.flag.as_str())
    }
}

impl Plugin for VisibilityPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn on_output_field_config(&self, config: FieldConfig) -> trellis_core::Result<Option<FieldConfig>> {
        if let Some(flag) = self.hidden(&config.extensions) {
            debug!(field = %config.coordinate(), flag, "Hiding field");
            return Ok(None);
        }
        Ok(Some(config))
    }

    fn on_input_field_config(&self, config: InputFieldConfig) -> trellis_core::Result<Option<InputFieldConfig>> {
        if let Some(flag) = self.hidden(&config.extensions) {
            debug!(field = %config.coordinate(), flag, "Hiding input field");
            return Ok(None);
        }
        Ok(Some(config))
    }

    fn on_enum_value_config(&self, config: EnumValueConfig) -> trellis_core::Result<Option<EnumValueConfig>> {
        if let Some(flag) = self.hidden(&config.extensions) {
            debug!(enum_type = %config.parent_type, value = %config.name, flag, "Hiding enum value");
            return Ok(None);
        }
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_unless_enabled() {
        let plugin = VisibilityPlugin::new(VisibilityOptions {
            enabled: vec!["beta".to_string()],
        });

        let beta = Extensions::new().with(Visibility::flag("beta"));
        let internal = Extensions::new().with(Visibility::flag("internal"));
        assert_eq!(plugin.hidden(&beta), None);
        assert_eq!(plugin.hidden(&internal), Some("internal"));
        assert_eq!(plugin.hidden(&Extensions::new()), None);
    }
}
