//! The plugin chain.
//!
//! A plugin implements any subset of the [`Plugin`] hooks; every hook has a
//! no-op default. Plugins run in a fixed order: the names listed in
//! [`BuilderOptions::plugins`](crate::BuilderOptions::plugins) first, then
//! instances added with [`SchemaBuilder::plugin`](crate::SchemaBuilder::plugin).
//!
//! # Ordering
//!
//! - Config hooks (`on_type_config`, `on_output_field_config`, ...) form a
//!   pipeline in registration order. Each plugin sees the output of the
//!   plugins before it. A plugin reading data that a later plugin writes
//!   sees nothing.
//! - Wrapping hooks (`wrap_resolve`, `wrap_subscribe`, `wrap_resolve_type`)
//!   make the first-registered plugin the outermost wrapper. For plugins
//!   `[p1, p2]` the effective resolver is `p1(p2(resolver))`, so `p1` runs
//!   first on the way in and last on the way out.

mod registry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use registry::{PluginFactory, PluginInit, PluginRegistry};

use crate::context::{RequestContext, RequestData};
use crate::resolve::{ResolveTypeFn, Resolver, Subscriber};
use crate::schema::BuiltSchema;
use crate::store::ConfigStore;
use crate::types::{EnumValueConfig, FieldConfig, InputFieldConfig, TypeConfig};
use crate::Result;

/// A build-time and request-time extension.
///
/// Build hooks return [`SchemaError`](crate::SchemaError) to abort the
/// build; use [`SchemaError::plugin`](crate::SchemaError::plugin) and name
/// the offending type or field in the message. Wrapped resolvers report
/// request-time failures as [`async_graphql::Error`] and must not swallow
/// errors from the resolver they wrap unless that is their documented job.
pub trait Plugin: Send + Sync + 'static {
    /// Name used for logging and as the request data key. Unique within a
    /// chain.
    fn name(&self) -> &str;

    /// Called once, after the store is frozen and before any pipeline runs.
    fn before_build(&self, _store: &ConfigStore) -> Result<()> {
        Ok(())
    }

    /// Transforms one type config.
    fn on_type_config(&self, config: TypeConfig) -> Result<TypeConfig> {
        Ok(config)
    }

    /// Transforms one output field config. `Ok(None)` drops the field.
    fn on_output_field_config(&self, config: FieldConfig) -> Result<Option<FieldConfig>> {
        Ok(Some(config))
    }

    /// Transforms one argument or input object field. `Ok(None)` drops it.
    fn on_input_field_config(&self, config: InputFieldConfig) -> Result<Option<InputFieldConfig>> {
        Ok(Some(config))
    }

    /// Transforms one enum value. `Ok(None)` drops it.
    fn on_enum_value_config(&self, config: EnumValueConfig) -> Result<Option<EnumValueConfig>> {
        Ok(Some(config))
    }

    /// Wraps a field resolver. `field` is the final config, with its type
    /// resolved.
    fn wrap_resolve(&self, resolver: Resolver, _field: &FieldConfig, _handle: &PluginHandle) -> Resolver {
        resolver
    }

    /// Wraps the event source of a subscription field.
    fn wrap_subscribe(&self, subscribe: Subscriber, _field: &FieldConfig, _handle: &PluginHandle) -> Subscriber {
        subscribe
    }

    /// Wraps the discriminator of an interface or union.
    fn wrap_resolve_type(
        &self,
        resolve_type: ResolveTypeFn,
        _config: &TypeConfig,
        _handle: &PluginHandle,
    ) -> ResolveTypeFn {
        resolve_type
    }

    /// Creates this plugin's data for one request. Called at most once per
    /// request, on first access through [`PluginHandle::request_data`].
    fn create_request_data(&self, _ctx: &RequestContext) -> Option<RequestData> {
        None
    }

    /// Called with the finished schema. An error discards the schema.
    fn after_build(&self, _schema: &BuiltSchema) -> Result<()> {
        Ok(())
    }
}

/// A cloneable handle to a plugin instance, given to wrapping hooks so that
/// the wrappers they return can reach the plugin's request data.
#[derive(Clone)]
pub struct PluginHandle {
    name: Arc<str>,
    plugin: Arc<dyn Plugin>,
}

impl PluginHandle {
    /// Wraps a plugin instance. The build pass creates one handle per
    /// plugin; plugin crates use this to exercise their wrappers directly.
    #[must_use]
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            name: Arc::from(plugin.name()),
            plugin,
        }
    }

    /// Plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plugin instance.
    #[must_use]
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// This plugin's data for the request `ctx` belongs to, created on first
    /// access with [`Plugin::create_request_data`].
    #[must_use]
    pub fn request_data(&self, ctx: &RequestContext) -> Option<RequestData> {
        ctx.request_data(&self.name, || self.plugin.create_request_data(ctx))
    }

    /// Typed [`request_data`](Self::request_data).
    #[must_use]
    pub fn request_data_as<T: Any + Send + Sync>(&self, ctx: &RequestContext) -> Option<Arc<T>> {
        self.request_data(ctx)
            .and_then(|data| data.downcast::<T>().ok())
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        created: AtomicUsize,
    }

    impl Plugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn create_request_data(&self, _ctx: &RequestContext) -> Option<RequestData> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(n))
        }
    }

    #[test]
    fn test_request_data_once_per_request() {
        let plugin = Arc::new(Counting {
            created: AtomicUsize::new(0),
        });
        let handle = PluginHandle::new(plugin.clone());

        let first = RequestContext::new();
        assert_eq!(handle.request_data_as::<usize>(&first).as_deref(), Some(&0));
        assert_eq!(handle.request_data_as::<usize>(&first).as_deref(), Some(&0));

        let second = RequestContext::new();
        assert_eq!(handle.request_data_as::<usize>(&second).as_deref(), Some(&1));
        assert_eq!(plugin.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_hooks_are_identity() {
        struct Noop;
        impl Plugin for Noop {
            fn name(&self) -> &str {
                "noop"
            }
        }

        let handle = PluginHandle::new(Arc::new(Noop));
        assert_eq!(handle.name(), "noop");
        assert!(handle.request_data(&RequestContext::new()).is_none());
        assert!(Noop.before_build(&ConfigStore::new()).is_ok());
    }
}
