//! Lazy schema building.
//!
//! `LazySchema` defers the build pass until first access, so a service can
//! start serving before its schema exists, and rebuilds after
//! [`invalidate`](LazySchema::invalidate).

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::BuiltSchema;
use crate::builder::SchemaBuilder;
use crate::error::SchemaError;
use crate::Result;

/// Produces a fresh builder for every build.
pub type BuilderFactory = Arc<dyn Fn() -> Result<SchemaBuilder> + Send + Sync>;

/// State of the lazy schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Not built yet, or invalidated.
    Uninitialized,
    /// A build is running.
    Building,
    /// Ready for use.
    Ready,
    /// The last build failed.
    Failed,
}

/// Thread-safe lazily built schema.
///
/// # Example
///
/// ```ignore
/// let lazy = LazySchema::new(|| {
///     let mut builder = SchemaBuilder::default();
///     builder.query_field("hello", |t| t.string().resolve(|_| async { Ok("world".into()) }))?;
///     Ok(builder)
/// });
///
/// let schema = lazy.get_or_build().await?;
/// lazy.invalidate().await;
/// ```
pub struct LazySchema {
    schema: RwLock<Option<Arc<BuiltSchema>>>,
    build_lock: Mutex<()>,
    state: RwLock<SchemaState>,
    factory: BuilderFactory,
    last_error: RwLock<Option<String>>,
}

impl LazySchema {
    /// Creates a lazy schema built from `factory`.
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<SchemaBuilder> + Send + Sync + 'static,
    {
        Self {
            schema: RwLock::new(None),
            build_lock: Mutex::new(()),
            state: RwLock::new(SchemaState::Uninitialized),
            factory: Arc::new(factory),
            last_error: RwLock::new(None),
        }
    }

    /// Current state.
    pub async fn state(&self) -> SchemaState {
        *self.state.read().await
    }

    /// Returns the schema, building it if necessary.
    ///
    /// Does not wait for a build started by another caller.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::SchemaInitializing`] while another build is running
    /// - [`SchemaError::BuildFailed`] if the build fails
    pub async fn get_or_build(&self) -> Result<Arc<BuiltSchema>> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        if self.state().await == SchemaState::Building {
            return Err(SchemaError::SchemaInitializing);
        }
        let Ok(_guard) = self.build_lock.try_lock() else {
            return Err(SchemaError::SchemaInitializing);
        };
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        self.run_build().await
    }

    /// Returns the schema, waiting for a running build instead of failing.
    ///
    /// A previous failure is reported again without rebuilding; call
    /// [`invalidate`](Self::invalidate) to retry.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::BuildFailed`] if the build fails.
    pub async fn get_or_build_wait(&self) -> Result<Arc<BuiltSchema>> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        let _guard = self.build_lock.lock().await;
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        if self.state().await == SchemaState::Failed {
            if let Some(err) = self.last_error.read().await.as_ref() {
                return Err(SchemaError::BuildFailed(err.clone()));
            }
        }
        self.run_build().await
    }

    /// Must be called with the build lock held.
    async fn run_build(&self) -> Result<Arc<BuiltSchema>> {
        *self.state.write().await = SchemaState::Building;
        info!("Building schema");

        match (self.factory)().and_then(SchemaBuilder::build) {
            Ok(schema) => {
                let schema = Arc::new(schema);
                *self.schema.write().await = Some(Arc::clone(&schema));
                *self.state.write().await = SchemaState::Ready;
                *self.last_error.write().await = None;
                Ok(schema)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, code = e.error_code(), "Failed to build schema");
                *self.state.write().await = SchemaState::Failed;
                *self.last_error.write().await = Some(message.clone());
                Err(SchemaError::BuildFailed(message))
            }
        }
    }

    /// The schema if it is built, without triggering a build.
    pub async fn get(&self) -> Option<Arc<BuiltSchema>> {
        self.schema.read().await.clone()
    }

    /// Drops the cached schema; the next access rebuilds it.
    pub async fn invalidate(&self) {
        let _guard = self.build_lock.lock().await;
        *self.schema.write().await = None;
        *self.state.write().await = SchemaState::Uninitialized;
        *self.last_error.write().await = None;
        info!("Schema invalidated, will rebuild on next access");
    }

    /// Message of the last failed build.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Whether the schema is ready.
    pub async fn is_ready(&self) -> bool {
        self.state().await == SchemaState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hello_builder() -> Result<SchemaBuilder> {
        let mut builder = SchemaBuilder::default();
        builder.query_field("hello", |t| t.string())?;
        Ok(builder)
    }

    #[tokio::test]
    async fn test_builds_once_until_invalidated() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = LazySchema::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            hello_builder()
        });

        assert_eq!(lazy.state().await, SchemaState::Uninitialized);
        assert!(lazy.get().await.is_none());

        let first = lazy.get_or_build().await.unwrap();
        let second = lazy.get_or_build().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(lazy.is_ready().await);
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        lazy.invalidate().await;
        assert_eq!(lazy.state().await, SchemaState::Uninitialized);
        lazy.get_or_build_wait().await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_build_is_remembered() {
        let lazy = LazySchema::new(|| Ok(SchemaBuilder::default()));

        let err = lazy.get_or_build().await.err().unwrap();
        assert!(matches!(err, SchemaError::BuildFailed(_)));
        assert_eq!(lazy.state().await, SchemaState::Failed);
        assert!(lazy.last_error().await.unwrap().contains("Query"));

        let again = lazy.get_or_build_wait().await.err().unwrap();
        assert_eq!(again.error_code(), "BUILD_FAILED");
    }
}
