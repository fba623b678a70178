//! Per-request execution context.
//!
//! A [`RequestContext`] is created once per request and attached to the
//! engine request by [`BuiltSchema::execute`](crate::BuiltSchema::execute).
//! Clones share identity: every resolver in the request sees the same
//! context, which is what request-scoped plugin data is keyed by.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use uuid::Uuid;

use crate::extensions::Extensions;

/// Value a plugin caches for the lifetime of one request.
pub type RequestData = Arc<dyn Any + Send + Sync>;

type DataSlot = Arc<OnceLock<Option<RequestData>>>;

struct Inner {
    id: Uuid,
    data: Extensions,
    plugin_data: DashMap<String, DataSlot>,
}

/// Request context handed to every resolver.
///
/// # Example
///
/// ```ignore
/// let ctx = RequestContext::new().with(Viewer { id: "1000".into() });
/// let response = schema.execute("{ me { name } }", ctx).await;
/// ```
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

impl RequestContext {
    /// Creates an empty context with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self::from_extensions(Extensions::new())
    }

    /// Creates a context carrying the given application data.
    #[must_use]
    pub fn from_extensions(data: Extensions) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                data,
                plugin_data: DashMap::new(),
            }),
        }
    }

    /// Returns a new context with `value` added to the application data.
    ///
    /// The returned context has a fresh identity.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self::from_extensions(self.inner.data.clone().with(value))
    }

    /// Unique id of this request.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Application data of type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.data.get::<T>()
    }

    /// Whether two handles point at the same request.
    #[must_use]
    pub fn same_request(&self, other: &RequestContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the data cached under `owner`, creating it with `init` on first
    /// access.
    ///
    /// Lookup and creation happen in one step: concurrent first accesses from
    /// sibling resolvers run `init` at most once. `init` runs outside the map
    /// lock, so it may itself read other owners' data.
    pub fn request_data<F>(&self, owner: &str, init: F) -> Option<RequestData>
    where
        F: FnOnce() -> Option<RequestData>,
    {
        let existing = self
            .inner
            .plugin_data
            .get(owner)
            .map(|slot| Arc::clone(slot.value()));
        let slot = match existing {
            Some(slot) => slot,
            None => Arc::clone(
                self.inner
                    .plugin_data
                    .entry(owner.to_string())
                    .or_insert_with(|| Arc::new(OnceLock::new()))
                    .value(),
            ),
        };
        slot.get_or_init(init).clone()
    }

    /// Typed variant of [`request_data`](Self::request_data).
    pub fn request_data_as<T, F>(&self, owner: &str, init: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Option<T>,
    {
        self.request_data(owner, || init().map(|v| Arc::new(v) as RequestData))
            .and_then(|data| data.downcast::<T>().ok())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.inner.id)
            .field("data", &self.inner.data)
            .field("plugin_data", &self.inner.plugin_data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Viewer(&'static str);

    #[test]
    fn test_application_data() {
        let ctx = RequestContext::new().with(Viewer("luke"));
        assert_eq!(ctx.get::<Viewer>(), Some(&Viewer("luke")));
        assert!(ctx.get::<String>().is_none());
    }

    #[test]
    fn test_clones_share_identity() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        assert!(ctx.same_request(&clone));
        assert_eq!(ctx.id(), clone.id());
        assert!(!ctx.same_request(&RequestContext::new()));
    }

    #[test]
    fn test_request_data_created_once() {
        let ctx = RequestContext::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let data = ctx.request_data_as::<u32, _>("counter", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(7)
            });
            assert_eq!(data.as_deref(), Some(&7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different request gets its own data.
        let other = RequestContext::new();
        other.request_data_as::<u32, _>("counter", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(8)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_data_none_is_cached() {
        let ctx = RequestContext::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let data = ctx.request_data("empty", || {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            });
            assert!(data.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_request_data() {
        let ctx = RequestContext::new();
        let outer = ctx.request_data_as::<u32, _>("outer", || {
            let inner = ctx.request_data_as::<u32, _>("inner", || Some(1))?;
            Some(*inner + 1)
        });
        assert_eq!(outer.as_deref(), Some(&2));
    }

    #[tokio::test]
    async fn test_concurrent_first_touch() {
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ctx = ctx.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                ctx.request_data_as::<usize, _>("loader", || {
                    Some(calls.fetch_add(1, Ordering::SeqCst))
                })
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some(&0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
