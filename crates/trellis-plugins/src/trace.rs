//! Resolver tracing.
//!
//! Wraps root fields (or every field, with `all_fields`) in a `debug` span
//! and warns about resolvers that fail or run longer than the slow
//! threshold.
//!
//! ```toml
//! plugins = ["tracing"]
//!
//! [tracing]
//! all_fields = false
//! slow_threshold_ms = 100
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug_span, trace, warn};
use trellis_core::{FieldConfig, Plugin, PluginHandle, PluginInit, Resolver, TypeKind};

/// Registry name.
pub const NAME: &str = "tracing";

/// Options of the tracing plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingOptions {
    /// Trace every field instead of root fields and fields marked [`Traced`].
    pub all_fields: bool,

    /// Resolvers slower than this are logged at `warn`.
    /// Default: 100
    pub slow_threshold_ms: u64,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            all_fields: false,
            slow_threshold_ms: 100,
        }
    }
}

/// Field extension opting a non-root field into tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Traced;

/// Emits a span per traced resolver call.
#[derive(Debug, Default)]
pub struct TracingPlugin {
    options: TracingOptions,
}

impl TracingPlugin {
    #[must_use]
    pub fn new(options: TracingOptions) -> Self {
        Self { options }
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Fails if the `[tracing]` option block is malformed.
    pub fn factory(init: &PluginInit<'_>) -> trellis_core::Result<Arc<dyn Plugin>> {
        let options: TracingOptions = init.parse_options()?;
        Ok(Arc::new(Self::new(options)))
    }

    fn should_trace(&self, field: &FieldConfig) -> bool {
        self.options.all_fields
            || matches!(
                field.parent_kind,
                TypeKind::Query | TypeKind::Mutation | TypeKind::Subscription
            )
            || field.extensions.contains::<Traced>()
    }
}

impl Plugin for TracingPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn wrap_resolve(&self, resolver: Resolver, field: &FieldConfig, _handle: &PluginHandle) -> Resolver {
        if !self.should_trace(field) {
            return resolver;
        }

        let coordinate: Arc<str> = Arc::from(field.coordinate());
        let threshold = Duration::from_millis(self.options.slow_threshold_ms);

        Arc::new(move |params| {
            let resolver = Arc::clone(&resolver);
            let coordinate = Arc::clone(&coordinate);
            let span = debug_span!(
                "resolve",
                field = %coordinate,
                request_id = %params.context.id()
            );

            async move {
                let started = Instant::now();
                let result = resolver(params).await;
                let elapsed = started.elapsed();
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Err(e) => warn!(field = %coordinate, error = %e.message, elapsed_ms, "Resolver failed"),
                    Ok(_) if elapsed >= threshold => {
                        warn!(field = %coordinate, elapsed_ms, "Slow resolver");
                    }
                    Ok(_) => trace!(field = %coordinate, elapsed_ms, "Resolved"),
                }
                result
            }
            .instrument(span)
            .boxed()
        })
    }
}
