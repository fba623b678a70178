//! Scope-based authorization.
//!
//! Types and fields declare the scopes a caller needs through the
//! [`AuthScopes`] extension. The application grants scopes per request by
//! putting [`GrantedScopes`] into the [`RequestContext`]. Scopes declared on
//! a type apply to every field of that type, including inherited ones,
//! unless the field carries [`SkipTypeScopes`].
//!
//! ```toml
//! plugins = ["scopeAuth"]
//!
//! [scopeAuth]
//! require_mutation_scopes = true
//! unauthorized_as_null = false
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::ErrorExtensions;
use dashmap::DashMap;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trellis_core::{
    FieldConfig, Plugin, PluginHandle, PluginInit, RequestContext, RequestData, Resolver,
    SchemaError, Subscriber, TypeConfig, TypeKind, Value,
};

/// Registry name.
pub const NAME: &str = "scopeAuth";

/// Error code set on denied fields.
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";

/// Scopes required by a type or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScopes {
    /// At least one of the scopes.
    Any(Vec<String>),
    /// Every one of the scopes.
    All(Vec<String>),
}

impl AuthScopes {
    pub fn any<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(scopes.into_iter().map(Into::into).collect())
    }

    pub fn all<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All(scopes.into_iter().map(Into::into).collect())
    }

    /// Whether `granted` satisfies this requirement. An empty `Any` is never
    /// satisfied, an empty `All` always is.
    #[must_use]
    pub fn is_satisfied_by(&self, granted: &GrantedScopes) -> bool {
        match self {
            Self::Any(scopes) => scopes.iter().any(|s| granted.contains(s)),
            Self::All(scopes) => scopes.iter().all(|s| granted.contains(s)),
        }
    }
}

/// Field extension: ignore the parent type's scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipTypeScopes;

/// Every requirement a field must pass, collected at build time.
#[derive(Debug, Clone)]
struct RequiredScopes(Vec<AuthScopes>);

/// Scopes granted to the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedScopes(HashSet<String>);

impl GrantedScopes {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(scopes.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }
}

/// Options of the scope auth plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeAuthOptions {
    /// Fail the build when a mutation field declares no scopes.
    pub require_mutation_scopes: bool,

    /// Resolve denied nullable fields to `null` instead of an error.
    pub unauthorized_as_null: bool,
}

/// Checks declared scopes before running a resolver.
#[derive(Debug, Default)]
pub struct ScopeAuthPlugin {
    options: ScopeAuthOptions,
    type_scopes: DashMap<String, AuthScopes>,
}

impl ScopeAuthPlugin {
    #[must_use]
    pub fn new(options: ScopeAuthOptions) -> Self {
        Self {
            options,
            type_scopes: DashMap::new(),
        }
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Fails if the `[scopeAuth]` option block is malformed.
    pub fn factory(init: &PluginInit<'_>) -> trellis_core::Result<Arc<dyn Plugin>> {
        let options: ScopeAuthOptions = init.parse_options()?;
        Ok(Arc::new(Self::new(options)))
    }
}

fn unauthorized(coordinate: &str) -> async_graphql::Error {
    async_graphql::Error::new(format!("Not authorized to resolve `{coordinate}`"))
        .extend_with(|_, e| e.set("code", UNAUTHORIZED))
}

fn granted(handle: &PluginHandle, ctx: &RequestContext) -> Arc<GrantedScopes> {
    handle.request_data_as::<GrantedScopes>(ctx).unwrap_or_default()
}

impl Plugin for ScopeAuthPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn on_type_config(&self, config: TypeConfig) -> trellis_core::Result<TypeConfig> {
        if let Some(scopes) = config.extensions.get::<AuthScopes>() {
            self.type_scopes.insert(config.name.clone(), scopes.clone());
        }
        Ok(config)
    }

    fn on_output_field_config(&self, mut config: FieldConfig) -> trellis_core::Result<Option<FieldConfig>> {
        let mut required = Vec::new();
        if !config.extensions.contains::<SkipTypeScopes>() {
            if let Some(scopes) = self.type_scopes.get(&config.parent_type) {
                required.push(scopes.value().clone());
            }
        }
        if let Some(scopes) = config.extensions.get::<AuthScopes>() {
            required.push(scopes.clone());
        }

        if required.is_empty() {
            if self.options.require_mutation_scopes && config.parent_kind == TypeKind::Mutation {
                return Err(SchemaError::plugin(
                    NAME,
                    format!("mutation field `{}` declares no auth scopes", config.coordinate()),
                ));
            }
            return Ok(Some(config));
        }

        config.extensions.insert(RequiredScopes(required));
        Ok(Some(config))
    }

    fn wrap_resolve(&self, resolver: Resolver, field: &FieldConfig, handle: &PluginHandle) -> Resolver {
        let Some(RequiredScopes(required)) = field.extensions.get::<RequiredScopes>() else {
            return resolver;
        };

        let required = Arc::new(required.clone());
        let handle = handle.clone();
        let coordinate: Arc<str> = Arc::from(field.coordinate());
        // A null on a non-null field would bubble up to the parent, so only
        // nullable fields are converted.
        let as_null = self.options.unauthorized_as_null
            && field.resolved_type.as_ref().is_some_and(|t| t.nullable);

        Arc::new(move |params| {
            let resolver = Arc::clone(&resolver);
            let required = Arc::clone(&required);
            let handle = handle.clone();
            let coordinate = Arc::clone(&coordinate);

            async move {
                let granted = granted(&handle, &params.context);
                if required.iter().all(|scopes| scopes.is_satisfied_by(&granted)) {
                    return resolver(params).await;
                }
                debug!(field = %coordinate, "Denied field access");
                if as_null {
                    Ok(Value::Null)
                } else {
                    Err(unauthorized(&coordinate))
                }
            }
            .boxed()
        })
    }

    fn wrap_subscribe(&self, subscribe: Subscriber, field: &FieldConfig, handle: &PluginHandle) -> Subscriber {
        let Some(RequiredScopes(required)) = field.extensions.get::<RequiredScopes>() else {
            return subscribe;
        };

        let required = Arc::new(required.clone());
        let handle = handle.clone();
        let coordinate: Arc<str> = Arc::from(field.coordinate());

        Arc::new(move |params| {
            let subscribe = Arc::clone(&subscribe);
            let required = Arc::clone(&required);
            let handle = handle.clone();
            let coordinate = Arc::clone(&coordinate);

            async move {
                let granted = granted(&handle, &params.context);
                if !required.iter().all(|scopes| scopes.is_satisfied_by(&granted)) {
                    debug!(field = %coordinate, "Denied subscription");
                    return Err(unauthorized(&coordinate));
                }
                subscribe(params).await
            }
            .boxed()
        })
    }

    fn create_request_data(&self, ctx: &RequestContext) -> Option<RequestData> {
        let granted = ctx.get::<GrantedScopes>().cloned().unwrap_or_default();
        Some(Arc::new(granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Extensions, FieldType};

    fn mutation_field(extensions: Extensions) -> FieldConfig {
        FieldConfig {
            name: "deleteUser".to_string(),
            parent_type: "Mutation".to_string(),
            parent_kind: TypeKind::Mutation,
            field_type: FieldType::named("Boolean"),
            resolved_type: None,
            args: Default::default(),
            description: None,
            deprecation_reason: None,
            resolver: None,
            subscribe: None,
            extensions,
        }
    }

    #[test]
    fn test_scope_matching() {
        let granted = GrantedScopes::new(["read", "write"]);
        assert!(AuthScopes::any(["admin", "read"]).is_satisfied_by(&granted));
        assert!(!AuthScopes::any(["admin"]).is_satisfied_by(&granted));
        assert!(AuthScopes::all(["read", "write"]).is_satisfied_by(&granted));
        assert!(!AuthScopes::all(["read", "admin"]).is_satisfied_by(&granted));
        assert!(!AuthScopes::any(Vec::<String>::new()).is_satisfied_by(&granted));
    }

    #[test]
    fn test_require_mutation_scopes() {
        let plugin = ScopeAuthPlugin::new(ScopeAuthOptions {
            require_mutation_scopes: true,
            ..ScopeAuthOptions::default()
        });

        let err = plugin
            .on_output_field_config(mutation_field(Extensions::new()))
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "PLUGIN_FAILED");
        assert!(err.to_string().contains("Mutation.deleteUser"));

        let scoped = Extensions::new().with(AuthScopes::any(["admin"]));
        assert!(plugin.on_output_field_config(mutation_field(scoped)).is_ok());
    }

    #[test]
    fn test_request_data_reads_granted_scopes() {
        let plugin = ScopeAuthPlugin::default();
        let ctx = RequestContext::new().with(GrantedScopes::new(["read"]));
        let data = plugin.create_request_data(&ctx).unwrap();
        let granted = data.downcast::<GrantedScopes>().unwrap();
        assert!(granted.contains("read"));

        let anonymous = plugin.create_request_data(&RequestContext::new()).unwrap();
        assert_eq!(*anonymous.downcast::<GrantedScopes>().unwrap(), GrantedScopes::default());
    }
}
