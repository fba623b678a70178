//! Enum value definitions.
//!
//! Values can be given as a plain list of names or as a keyed map with
//! per-value options; both normalize to the same [`EnumValueConfig`] map.

use std::any::Any;

use async_graphql::Value;
use indexmap::IndexMap;

use crate::extensions::Extensions;
use crate::types::EnumValueConfig;

/// Options for one enum value.
#[derive(Debug, Default)]
#[must_use]
pub struct EnumValueOptions {
    description: Option<String>,
    deprecation_reason: Option<String>,
    value: Option<Value>,
    extensions: Extensions,
}

impl EnumValueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    /// Internal value; defaults to the value name as a string.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }
}

/// The values of an enum, in declaration order.
#[derive(Debug, Default)]
#[must_use]
pub struct EnumValues {
    values: IndexMap<String, EnumValueOptions>,
}

impl EnumValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value with options.
    pub fn value(mut self, name: impl Into<String>, options: EnumValueOptions) -> Self {
        self.values.insert(name.into(), options);
        self
    }

    /// Adds a value whose internal value is its name.
    pub fn name(self, name: impl Into<String>) -> Self {
        self.value(name, EnumValueOptions::new())
    }

    pub(crate) fn into_configs(self, parent_type: &str) -> IndexMap<String, EnumValueConfig> {
        self.values
            .into_iter()
            .map(|(name, options)| {
                let config = EnumValueConfig {
                    value: options.value.unwrap_or_else(|| Value::String(name.clone())),
                    name: name.clone(),
                    parent_type: parent_type.to_string(),
                    description: options.description,
                    deprecation_reason: options.deprecation_reason,
                    extensions: options.extensions,
                };
                (name, config)
            })
            .collect()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for EnumValues {
    fn from(names: [S; N]) -> Self {
        names.into_iter().fold(Self::new(), Self::name)
    }
}

impl<S: Into<String>> From<Vec<S>> for EnumValues {
    fn from(names: Vec<S>) -> Self {
        names.into_iter().fold(Self::new(), Self::name)
    }
}

impl<S: Into<String>> FromIterator<(S, EnumValueOptions)> for EnumValues {
    fn from_iter<I: IntoIterator<Item = (S, EnumValueOptions)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |values, (name, options)| values.value(name, options))
    }
}
