//! Resolver function types and the parameters they receive.
//!
//! Resolvers take owned [`ResolveParams`] and return a boxed future, which
//! lets plugins wrap them freely: a wrapper is just another [`Resolver`]
//! that calls the one it was given.

use std::future::Future;
use std::sync::Arc;

use async_graphql::{Name, Value};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;

/// Result of resolving a field. `Value::Null` resolves to `null`.
pub type ResolveResult = async_graphql::Result<Value>;

/// Field resolver.
pub type Resolver = Arc<dyn Fn(ResolveParams) -> BoxFuture<'static, ResolveResult> + Send + Sync>;

/// Event stream produced by a subscription field.
pub type EventStream = BoxStream<'static, ResolveResult>;

/// Subscription source: opens the event stream for one subscription.
pub type Subscriber = Arc<
    dyn Fn(ResolveParams) -> BoxFuture<'static, async_graphql::Result<EventStream>> + Send + Sync,
>;

/// Discriminator for interfaces and unions: returns the concrete object type
/// name for a value, or `None` if it cannot tell.
pub type ResolveTypeFn = Arc<dyn Fn(&Value, &RequestContext) -> Option<String> + Send + Sync>;

/// Predicate telling whether a value belongs to an object type.
pub type IsTypeOfFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Builds a [`Resolver`] from an async closure.
pub fn resolver<F, Fut>(f: F) -> Resolver
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolveResult> + Send + 'static,
{
    Arc::new(move |params| f(params).boxed())
}

/// Builds a [`Subscriber`] from an async closure returning a stream.
pub fn subscriber<F, Fut, S>(f: F) -> Subscriber
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = async_graphql::Result<S>> + Send + 'static,
    S: Stream<Item = ResolveResult> + Send + 'static,
{
    Arc::new(move |params| {
        let fut = f(params);
        async move { fut.await.map(StreamExt::boxed) }.boxed()
    })
}

/// Resolver returning `parent[name]`, passing the raw value through.
#[must_use]
pub fn property_resolver(name: impl Into<String>) -> Resolver {
    let name: Arc<str> = Arc::from(name.into());
    Arc::new(move |params| {
        let value = property(&params.parent, &name).cloned().unwrap_or(Value::Null);
        futures_util::future::ready(Ok(value)).boxed()
    })
}

/// Resolver returning the parent value itself. Subscription fields use it to
/// forward each event unchanged.
#[must_use]
pub fn identity_resolver() -> Resolver {
    Arc::new(|params| futures_util::future::ready(Ok(params.parent)).boxed())
}

/// Reads a property of an object value.
#[must_use]
pub fn property<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(name),
        _ => None,
    }
}

/// Static information about the field being resolved.
#[derive(Debug, Clone)]
pub struct ResolveInfo {
    /// Name of the type that owns the field.
    pub parent_type: String,
    /// Field name.
    pub field_name: String,
    /// Printed return type, e.g. `[Character!]`.
    pub return_type: String,
}

impl ResolveInfo {
    /// `Type.field` coordinate.
    #[must_use]
    pub fn coordinate(&self) -> String {
        format!("{}.{}", self.parent_type, self.field_name)
    }
}

/// Everything a resolver receives for one invocation.
#[derive(Clone)]
pub struct ResolveParams {
    /// The parent value (`Null` for root fields).
    pub parent: Value,
    /// Coerced argument values.
    pub args: IndexMap<String, Value>,
    /// Request context shared by every resolver in the request.
    pub context: RequestContext,
    /// Field metadata.
    pub info: Arc<ResolveInfo>,
}

impl ResolveParams {
    /// Returns an argument value, if provided.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !matches!(v, Value::Null))
    }

    /// Deserializes an argument into `T`. Returns `None` when absent or null.
    ///
    /// # Errors
    ///
    /// Returns a field error if the value does not match `T`.
    pub fn arg_as<T: DeserializeOwned>(&self, name: &str) -> async_graphql::Result<Option<T>> {
        self.arg(name)
            .map(|value| from_value(value.clone(), &format!("argument `{name}`")))
            .transpose()
    }

    /// Reads a property of the parent value.
    #[must_use]
    pub fn parent_field(&self, name: &str) -> Option<&Value> {
        property(&self.parent, name)
    }

    /// Deserializes the parent value into `T`.
    ///
    /// # Errors
    ///
    /// Returns a field error if the parent does not match `T`.
    pub fn parent_as<T: DeserializeOwned>(&self) -> async_graphql::Result<T> {
        from_value(self.parent.clone(), "parent value")
    }
}

fn from_value<T: DeserializeOwned>(value: Value, what: &str) -> async_graphql::Result<T> {
    let json = value
        .into_json()
        .map_err(|e| async_graphql::Error::new(format!("Invalid {what}: {e}")))?;
    serde_json::from_value(json).map_err(|e| async_graphql::Error::new(format!("Invalid {what}: {e}")))
}

/// Converts a `serde_json::Value` to an engine value.
#[must_use]
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                async_graphql::Number::from_f64(f).map_or(Value::Null, Value::Number)
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (Name::new(k), json_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn params(parent: serde_json::Value, args: &[(&str, serde_json::Value)]) -> ResolveParams {
        ResolveParams {
            parent: json_to_value(parent),
            args: args
                .iter()
                .map(|(k, v)| ((*k).to_string(), json_to_value(v.clone())))
                .collect(),
            context: RequestContext::new(),
            info: Arc::new(ResolveInfo {
                parent_type: "Query".into(),
                field_name: "test".into(),
                return_type: "String".into(),
            }),
        }
    }

    #[test]
    fn test_json_to_value_primitives() {
        assert!(matches!(json_to_value(json!(null)), Value::Null));
        assert!(matches!(json_to_value(json!(true)), Value::Boolean(true)));
        assert!(matches!(json_to_value(json!(42)), Value::Number(_)));
        assert!(matches!(json_to_value(json!(1.5)), Value::Number(_)));
        assert!(matches!(json_to_value(json!("hi")), Value::String(s) if s == "hi"));
    }

    #[test]
    fn test_json_to_value_complex() {
        assert!(matches!(json_to_value(json!([1, 2])), Value::List(l) if l.len() == 2));
        assert!(matches!(json_to_value(json!({"a": 1})), Value::Object(_)));
    }

    #[tokio::test]
    async fn test_property_resolver_passes_raw_value() {
        let resolve = property_resolver("age");
        let value = resolve(params(json!({"age": "not a number"}), &[]))
            .await
            .unwrap();
        assert_eq!(value, Value::String("not a number".into()));

        let missing = resolve(params(json!({}), &[])).await.unwrap();
        assert_eq!(missing, Value::Null);

        let scalar_parent = resolve(params(json!(3), &[])).await.unwrap();
        assert_eq!(scalar_parent, Value::Null);
    }

    #[test]
    fn test_arg_helpers() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Filter {
            name: String,
        }

        let p = params(
            json!({"id": "1"}),
            &[("filter", json!({"name": "Luke"})), ("empty", json!(null))],
        );
        assert_eq!(
            p.arg_as::<Filter>("filter").unwrap(),
            Some(Filter {
                name: "Luke".into()
            })
        );
        assert!(p.arg("empty").is_none());
        assert_eq!(p.arg_as::<Filter>("missing").unwrap(), None);
        assert!(p.arg_as::<u32>("filter").is_err());
        assert_eq!(p.parent_field("id"), Some(&Value::String("1".into())));
        assert_eq!(p.info.coordinate(), "Query.test");
    }
}
