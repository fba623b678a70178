//! Relay-style connections, global IDs and mutations.
//!
//! Connection types follow the Relay cursor connection model: a `{Name}Connection`
//! with `edges` and `pageInfo`, a `{Name}Edge` with a cursor and a `node`,
//! and one shared page info type. Type and field names come from
//! [`RelayOptions`](trellis_core::RelayOptions).
//!
//! # Example
//!
//! ```ignore
//! let ships = builder.connection_type("Ship", &ship)?;
//! builder.object_field(&faction, "ships", move |t| {
//!     with_connection_args(t, t.field(&ships)).resolver(array_connection(
//!         "cursor",
//!         |params| async move { Ok(load_ships(&params.parent).await) },
//!     ))
//! })?;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_graphql::Name;
use base64::Engine;
use futures_util::FutureExt;
use trellis_core::resolve::property;
use trellis_core::{
    ClientMutationId, FieldBuilder, FieldRef, InputFieldBuilder, InputFieldRef, InputTypeOptions,
    ObjectRef, ObjectTypeOptions, ResolveParams, Resolver, SchemaBuilder, TypeKind, TypeParam,
    Value,
};

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Name of the generated mutation input and payload field.
pub const CLIENT_MUTATION_ID: &str = "clientMutationId";

/// Encodes an offset into an opaque cursor.
#[must_use]
pub fn encode_cursor(offset: usize) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decodes a cursor produced by [`encode_cursor`].
#[must_use]
pub fn decode_cursor(cursor: &str) -> Option<usize> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.strip_prefix(CURSOR_PREFIX)?.parse().ok()
}

/// A decoded global object id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalId {
    pub type_name: String,
    pub id: String,
}

/// Encodes `type_name` and `id` into one opaque id.
#[must_use]
pub fn encode_global_id(type_name: &str, id: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("{type_name}:{id}"))
}

/// Decodes an id produced by [`encode_global_id`].
#[must_use]
pub fn decode_global_id(global_id: &str) -> Option<GlobalId> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(global_id)
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (type_name, id) = text.split_once(':')?;
    if type_name.is_empty() {
        return None;
    }
    Some(GlobalId {
        type_name: type_name.to_string(),
        id: id.to_string(),
    })
}

/// Pagination arguments of a connection field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl ConnectionArgs {
    /// Reads `first`, `last`, `after` and `before` from the field arguments.
    ///
    /// # Errors
    ///
    /// Fails on negative counts and on cursors that do not decode.
    pub fn from_params(params: &ResolveParams) -> async_graphql::Result<Self> {
        let count = |name: &str| -> async_graphql::Result<Option<usize>> {
            match params.arg_as::<i64>(name)? {
                None => Ok(None),
                Some(n) => usize::try_from(n)
                    .map(Some)
                    .map_err(|_| async_graphql::Error::new(format!("Argument `{name}` must be non-negative"))),
            }
        };

        let args = Self {
            first: count("first")?,
            last: count("last")?,
            after: params.arg_as("after")?,
            before: params.arg_as("before")?,
        };
        for cursor in [&args.after, &args.before].into_iter().flatten() {
            if decode_cursor(cursor).is_none() {
                return Err(async_graphql::Error::new(format!("Invalid cursor `{cursor}`")));
            }
        }
        Ok(args)
    }

    /// The `start..end` window of a list of `total` items, and whether there
    /// are items beyond it on either side.
    #[must_use]
    pub fn window(&self, total: usize) -> Window {
        let after = self.after.as_deref().and_then(decode_cursor);
        let before = self.before.as_deref().and_then(decode_cursor);

        let lower = after.map_or(0, |a| a.saturating_add(1).min(total));
        let upper = before.map_or(total, |b| b.min(total)).max(lower);

        let mut start = lower;
        let mut end = upper;
        if let Some(first) = self.first {
            end = end.min(start.saturating_add(first));
        }
        if let Some(last) = self.last {
            start = start.max(end.saturating_sub(last));
        }

        Window {
            start,
            end,
            has_previous_page: self.last.is_some() && start > lower,
            has_next_page: self.first.is_some() && end < upper,
        }
    }
}

/// A slice of a list selected by [`ConnectionArgs::window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

fn object<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    Value::Object(
        entries
            .into_iter()
            .map(|(key, value)| (Name::new(key), value))
            .collect(),
    )
}

/// Builds the connection value for the items of a full list. Edges carry
/// their cursor under `cursor_field`.
#[must_use]
pub fn resolve_array_connection(args: &ConnectionArgs, items: Vec<Value>, cursor_field: &str) -> Value {
    let window = args.window(items.len());
    let edges: Vec<Value> = items
        .into_iter()
        .enumerate()
        .skip(window.start)
        .take(window.end - window.start)
        .map(|(offset, node)| {
            object([
                (cursor_field, Value::String(encode_cursor(offset))),
                ("node", node),
            ])
        })
        .collect();

    let cursor_at = |offset: usize| Value::String(encode_cursor(offset));
    let (start_cursor, end_cursor) = if edges.is_empty() {
        (Value::Null, Value::Null)
    } else {
        (cursor_at(window.start), cursor_at(window.end - 1))
    };

    object([
        ("edges", Value::List(edges)),
        (
            "pageInfo",
            object([
                ("hasNextPage", Value::Boolean(window.has_next_page)),
                ("hasPreviousPage", Value::Boolean(window.has_previous_page)),
                ("startCursor", start_cursor),
                ("endCursor", end_cursor),
            ]),
        ),
    ])
}

/// Resolver paginating the list returned by `f`.
pub fn array_connection<F, Fut>(cursor_field: impl Into<String>, f: F) -> Resolver
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = async_graphql::Result<Vec<Value>>> + Send + 'static,
{
    let cursor_field: Arc<str> = Arc::from(cursor_field.into());
    let f = Arc::new(f);
    Arc::new(move |params| {
        let cursor_field = Arc::clone(&cursor_field);
        let f = Arc::clone(&f);
        async move {
            let args = ConnectionArgs::from_params(&params)?;
            let items = f(params).await?;
            Ok(resolve_array_connection(&args, items, &cursor_field))
        }
        .boxed()
    })
}

/// Adds the `first`, `last`, `after` and `before` arguments to `field`.
pub fn with_connection_args(t: &FieldBuilder, field: FieldRef) -> FieldRef {
    field
        .arg("first", t.arg_int())
        .arg("last", t.arg_int())
        .arg("after", t.arg_string())
        .arg("before", t.arg_string())
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Relay helpers on [`SchemaBuilder`].
pub trait RelayBuilderExt {
    /// Registers the shared page info type once and names it.
    ///
    /// # Errors
    ///
    /// Fails if another type already owns the configured name.
    fn page_info_type(&mut self) -> trellis_core::Result<TypeParam>;

    /// Registers `{name}Connection` and `{name}Edge` over `node`.
    ///
    /// # Errors
    ///
    /// Fails if either name is taken or invalid.
    fn connection_type(&mut self, name: &str, node: impl Into<TypeParam>) -> trellis_core::Result<ObjectRef>;

    /// Adds a mutation field `name(input: {Name}Input!): {Name}Payload!`.
    ///
    /// `input` and `payload` produce the fields of the generated input and
    /// payload types. `clientMutationId` is added to both according to the
    /// relay options and is copied from the input into the payload.
    ///
    /// # Errors
    ///
    /// Fails if the generated type names are taken.
    fn relay_mutation_field<I, II, IK, P, PI, PK>(
        &mut self,
        name: &str,
        input: I,
        payload: P,
        resolver: Resolver,
    ) -> trellis_core::Result<()>
    where
        I: FnOnce(&InputFieldBuilder) -> II + Send + 'static,
        II: IntoIterator<Item = (IK, InputFieldRef)>,
        IK: Into<String>,
        P: FnOnce(&FieldBuilder) -> PI + Send + 'static,
        PI: IntoIterator<Item = (PK, FieldRef)>,
        PK: Into<String>;
}

impl RelayBuilderExt for SchemaBuilder {
    fn page_info_type(&mut self) -> trellis_core::Result<TypeParam> {
        let name = self.options().relay.page_info_type_name.clone();
        let param = TypeParam::from(name.as_str());
        if self
            .store()
            .get_config(&param, Some(TypeKind::Object))
            .is_ok()
        {
            return Ok(param);
        }

        self.object_type(
            &name,
            ObjectTypeOptions::new().fields(|t| {
                [
                    ("hasNextPage", t.expose_boolean("hasNextPage").nullable(false)),
                    ("hasPreviousPage", t.expose_boolean("hasPreviousPage").nullable(false)),
                    ("startCursor", t.expose_string("startCursor").nullable(true)),
                    ("endCursor", t.expose_string("endCursor").nullable(true)),
                ]
            }),
        )?;
        Ok(param)
    }

    fn connection_type(&mut self, name: &str, node: impl Into<TypeParam>) -> trellis_core::Result<ObjectRef> {
        let node = node.into();
        let cursor_field = self.options().relay.cursor_field_name.clone();
        let page_info = self.page_info_type()?;

        let edge = self.object_type(
            &format!("{name}Edge"),
            ObjectTypeOptions::new().fields(move |t| {
                vec![
                    (
                        cursor_field.clone(),
                        t.expose_string(&cursor_field).nullable(false),
                    ),
                    ("node".to_string(), t.expose("node", node)),
                ]
            }),
        )?;

        self.object_type(
            &format!("{name}Connection"),
            ObjectTypeOptions::new().fields(move |t| {
                [
                    (
                        "edges",
                        t.expose_list("edges", &edge)
                            .nullable(false)
                            .items_nullable(false),
                    ),
                    ("pageInfo", t.expose("pageInfo", page_info).nullable(false)),
                ]
            }),
        )
    }

    fn relay_mutation_field<I, II, IK, P, PI, PK>(
        &mut self,
        name: &str,
        input: I,
        payload: P,
        resolver: Resolver,
    ) -> trellis_core::Result<()>
    where
        I: FnOnce(&InputFieldBuilder) -> II + Send + 'static,
        II: IntoIterator<Item = (IK, InputFieldRef)>,
        IK: Into<String>,
        P: FnOnce(&FieldBuilder) -> PI + Send + 'static,
        PI: IntoIterator<Item = (PK, FieldRef)>,
        PK: Into<String>,
    {
        let base = upper_first(name);
        let policy = self.options().relay.client_mutation_id;

        let input_ref = self.input_type(
            &format!("{base}Input"),
            InputTypeOptions::new().fields(move |t| {
                let mut fields: Vec<(String, InputFieldRef)> =
                    input(t).into_iter().map(|(k, v)| (k.into(), v)).collect();
                match policy {
                    ClientMutationId::Omit => {}
                    ClientMutationId::Optional => fields.push((CLIENT_MUTATION_ID.to_string(), t.id().optional())),
                    ClientMutationId::Required => fields.push((CLIENT_MUTATION_ID.to_string(), t.id().required())),
                }
                fields
            }),
        )?;

        let payload_ref = self.object_type(
            &format!("{base}Payload"),
            ObjectTypeOptions::new().fields(move |t| {
                let mut fields: Vec<(String, FieldRef)> =
                    payload(t).into_iter().map(|(k, v)| (k.into(), v)).collect();
                if policy != ClientMutationId::Omit {
                    let field = t
                        .expose_id(CLIENT_MUTATION_ID)
                        .nullable(policy == ClientMutationId::Optional);
                    fields.push((CLIENT_MUTATION_ID.to_string(), field));
                }
                fields
            }),
        )?;

        let resolver = if policy == ClientMutationId::Omit {
            resolver
        } else {
            echo_client_mutation_id(resolver)
        };

        self.mutation_field(name, move |t| {
            t.field(&payload_ref)
                .nullable(false)
                .arg("input", t.arg(&input_ref).required())
                .resolver(resolver)
        })
    }
}

/// Copies `input.clientMutationId` into the object the mutation returns.
fn echo_client_mutation_id(resolver: Resolver) -> Resolver {
    Arc::new(move |params| {
        let resolver = Arc::clone(&resolver);
        async move {
            let client_id = params
                .arg("input")
                .and_then(|input| property(input, CLIENT_MUTATION_ID))
                .cloned();
            let mut result = resolver(params).await?;
            if let (Some(id), Value::Object(map)) = (client_id, &mut result) {
                map.insert(Name::new(CLIENT_MUTATION_ID), id);
            }
            Ok(result)
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(first: Option<usize>, last: Option<usize>, after: Option<usize>, before: Option<usize>) -> ConnectionArgs {
        ConnectionArgs {
            first,
            last,
            after: after.map(encode_cursor),
            before: before.map(encode_cursor),
        }
    }

    #[test]
    fn test_cursor_decoding() {
        assert_eq!(decode_cursor(&encode_cursor(42)), Some(42));
        assert_eq!(decode_cursor("not a cursor"), None);
        assert_eq!(decode_cursor(&encode_global_id("Ship", "1")), None);
    }

    #[test]
    fn test_global_ids() {
        let id = encode_global_id("Ship", "42:a");
        assert_eq!(
            decode_global_id(&id),
            Some(GlobalId {
                type_name: "Ship".to_string(),
                id: "42:a".to_string(),
            })
        );
        assert_eq!(decode_global_id("%%%"), None);
    }

    #[test]
    fn test_window_first_and_after() {
        let window = args(Some(2), None, None, None).window(5);
        assert_eq!((window.start, window.end), (0, 2));
        assert!(window.has_next_page);
        assert!(!window.has_previous_page);

        let window = args(Some(2), None, Some(2), None).window(5);
        assert_eq!((window.start, window.end), (3, 5));
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_window_last_and_before() {
        let window = args(None, Some(2), None, Some(4)).window(5);
        assert_eq!((window.start, window.end), (2, 4));
        assert!(window.has_previous_page);
        assert!(!window.has_next_page);

        let window = args(None, None, Some(10), None).window(5);
        assert_eq!((window.start, window.end), (5, 5));
    }

    #[test]
    fn test_array_connection_value() {
        let items = (0..3).map(Value::from).collect();
        let value = resolve_array_connection(&args(Some(1), None, Some(0), None), items, "cursor");
        let json = value.into_json().unwrap();

        assert_eq!(json["edges"][0]["node"], 1);
        assert_eq!(json["edges"][0]["cursor"], encode_cursor(1));
        assert_eq!(json["pageInfo"]["hasNextPage"], true);
        assert_eq!(json["pageInfo"]["endCursor"], encode_cursor(1));
    }

    #[test]
    fn test_upper_first() {
        assert_eq!(upper_first("introduceShip"), "IntroduceShip");
        assert_eq!(upper_first(""), "");
    }
}
