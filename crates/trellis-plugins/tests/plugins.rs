//! Built-in plugin integration tests.
//!
//! Every schema here is built through `builtin_registry()` with plugins
//! selected by name, the way an application configures them.

use serde_json::json;
use trellis_core::resolve::property;
use trellis_core::{
    BuilderOptions, EnumTypeOptions, EnumValueOptions, EnumValues, ObjectTypeOptions,
    RequestContext, SchemaBuilder, Value, json_to_value, resolver,
};
use trellis_plugins::{
    AuthScopes, GrantedScopes, RelayBuilderExt, SkipTypeScopes, Traced, Visibility,
    array_connection, builtin_registry, encode_cursor, with_connection_args,
};

fn builder(toml: &str) -> SchemaBuilder {
    let options = BuilderOptions::from_toml_str(toml).unwrap();
    SchemaBuilder::with_registry(options, builtin_registry())
}

async fn run(builder: SchemaBuilder, query: &str, ctx: RequestContext) -> serde_json::Value {
    let schema = builder.build().unwrap();
    let response = schema.execute(query, ctx).await;
    serde_json::to_value(&response).unwrap()
}

// =============================================================================
// scopeAuth
// =============================================================================

fn vault(toml: &str) -> SchemaBuilder {
    let mut builder = builder(toml);
    let vault = builder
        .object_type(
            "Vault",
            ObjectTypeOptions::new()
                .extension(AuthScopes::any(["banker"]))
                .fields(|t| {
                    [
                        ("gold", t.expose_int("gold")),
                        ("address", t.expose_string("address").extension(SkipTypeScopes)),
                    ]
                }),
        )
        .unwrap();
    builder
        .query_fields(move |t| {
            [
                (
                    "secret",
                    t.string()
                        .extension(AuthScopes::all(["admin"]))
                        .resolve(|_| async { Ok(Value::from("42")) }),
                ),
                ("public", t.string().resolve(|_| async { Ok(Value::from("hello")) })),
                (
                    "vault",
                    t.field(&vault).resolve(|_| async {
                        Ok(json_to_value(json!({ "gold": 7, "address": "Coruscant" })))
                    }),
                ),
            ]
        })
        .unwrap();
    builder
}

#[tokio::test]
async fn test_missing_scope_is_unauthorized_error() {
    let response = run(
        vault("plugins = [\"scopeAuth\"]"),
        "{ public secret }",
        RequestContext::new(),
    )
    .await;

    assert_eq!(response["data"]["public"], "hello");
    assert_eq!(response["data"]["secret"], serde_json::Value::Null);
    assert_eq!(response["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
    assert_eq!(response["errors"][0]["path"], json!(["secret"]));
}

#[tokio::test]
async fn test_granted_scope_resolves() {
    let ctx = RequestContext::new().with(GrantedScopes::new(["admin"]));
    let response = run(vault("plugins = [\"scopeAuth\"]"), "{ secret }", ctx).await;
    assert_eq!(response["data"], json!({ "secret": "42" }));
    assert!(response.get("errors").is_none());
}

#[tokio::test]
async fn test_type_scopes_apply_to_fields() {
    let query = "{ vault { gold address } }";

    let response = run(vault("plugins = [\"scopeAuth\"]"), query, RequestContext::new()).await;
    assert_eq!(response["data"]["vault"]["address"], "Coruscant");
    assert_eq!(response["errors"][0]["path"], json!(["vault", "gold"]));

    let ctx = RequestContext::new().with(GrantedScopes::new(["banker"]));
    let response = run(vault("plugins = [\"scopeAuth\"]"), query, ctx).await;
    assert_eq!(
        response["data"],
        json!({ "vault": { "gold": 7, "address": "Coruscant" } })
    );
}

#[tokio::test]
async fn test_unauthorized_as_null() {
    let response = run(
        vault("plugins = [\"scopeAuth\"]\n[scopeAuth]\nunauthorized_as_null = true\n"),
        "{ secret }",
        RequestContext::new(),
    )
    .await;
    assert_eq!(response["data"], json!({ "secret": null }));
    assert!(response.get("errors").is_none());
}

#[test]
fn test_require_mutation_scopes() {
    let mut builder = builder("plugins = [\"scopeAuth\"]\n[scopeAuth]\nrequire_mutation_scopes = true\n");
    builder.query_field("ping", |t| t.string()).unwrap();
    builder.mutation_field("launch", |t| t.boolean()).unwrap();

    let err = builder.build().unwrap_err();
    assert_eq!(err.error_code(), "PLUGIN_FAILED");
    assert!(err.to_string().contains("Mutation.launch"));
}

// =============================================================================
// visibility
// =============================================================================

fn flagged(toml: &str) -> SchemaBuilder {
    let mut builder = builder(toml);
    let episode = builder
        .enum_type(
            "Episode",
            EnumTypeOptions::new(
                EnumValues::new()
                    .value("NEWHOPE", EnumValueOptions::new())
                    .value("ANDOR", EnumValueOptions::new().extension(Visibility::flag("beta"))),
            ),
        )
        .unwrap();
    builder
        .query_fields(move |t| {
            [
                ("hero", t.string()),
                (
                    "preview",
                    t.string().extension(Visibility::flag("beta")),
                ),
                (
                    "search",
                    t.field(&episode)
                        .arg("text", t.arg_string())
                        .arg("fuzzy", t.arg_boolean().extension(Visibility::flag("beta"))),
                ),
            ]
        })
        .unwrap();
    builder
}

#[test]
fn test_hidden_elements_are_removed() {
    let sdl = flagged("plugins = [\"visibility\"]").build().unwrap().sdl();
    assert!(sdl.contains("hero: String"));
    assert!(!sdl.contains("preview"));
    assert!(!sdl.contains("fuzzy"));
    assert!(!sdl.contains("ANDOR"));
    assert!(sdl.contains("NEWHOPE"));
}

#[test]
fn test_enabled_flag_keeps_elements() {
    let sdl = flagged("plugins = [\"visibility\"]\n[visibility]\nenabled = [\"beta\"]\n")
        .build()
        .unwrap()
        .sdl();
    assert!(sdl.contains("preview: String"));
    assert!(sdl.contains("fuzzy: Boolean"));
    assert!(sdl.contains("ANDOR"));
}

// =============================================================================
// tracing
// =============================================================================

#[tokio::test]
async fn test_tracing_leaves_results_unchanged() {
    let mut builder = builder("plugins = [\"tracing\", \"scopeAuth\"]\n[tracing]\nslow_threshold_ms = 0\n");
    builder
        .query_fields(|t| {
            [
                (
                    "answer",
                    t.int()
                        .extension(Traced)
                        .resolve(|_| async { Ok(Value::from(42)) }),
                ),
                (
                    "broken",
                    t.int().resolve(|_| async { Err(async_graphql::Error::new("boom")) }),
                ),
            ]
        })
        .unwrap();

    let response = run(builder, "{ answer broken }", RequestContext::new()).await;
    assert_eq!(response["data"]["answer"], 42);
    assert_eq!(response["errors"][0]["message"], "boom");
}

// =============================================================================
// relay
// =============================================================================

fn fleet(toml: &str) -> SchemaBuilder {
    let mut builder = builder(toml);
    let ship = builder
        .object_type(
            "Ship",
            ObjectTypeOptions::new().fields(|t| [("name", t.expose_string("name"))]),
        )
        .unwrap();
    let ships = builder.connection_type("Ship", &ship).unwrap();
    builder
        .query_field("ships", move |t| {
            with_connection_args(t, t.field(&ships).nullable(false)).resolver(array_connection(
                "cursor",
                |_| async {
                    Ok(["X-Wing", "Y-Wing", "A-Wing"]
                        .into_iter()
                        .map(|name| json_to_value(json!({ "name": name })))
                        .collect())
                },
            ))
        })
        .unwrap();
    builder
        .relay_mutation_field(
            "introduceShip",
            |t| [("shipName", t.string().required())],
            |t| [("ship", t.expose_string("ship"))],
            resolver(|params| async move {
                let name = params
                    .arg("input")
                    .and_then(|input| property(input, "shipName"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Ok(json_to_value(json!({ "ship": name.into_json()? })))
            }),
        )
        .unwrap();
    builder
}

#[tokio::test]
async fn test_array_connection_pagination() {
    let response = run(
        fleet(""),
        &format!(
            "{{ ships(first: 1, after: \"{}\") {{ edges {{ cursor node {{ name }} }} pageInfo {{ hasNextPage hasPreviousPage endCursor }} }} }}",
            encode_cursor(0)
        ),
        RequestContext::new(),
    )
    .await;

    assert_eq!(
        response["data"]["ships"],
        json!({
            "edges": [{ "cursor": encode_cursor(1), "node": { "name": "Y-Wing" } }],
            "pageInfo": {
                "hasNextPage": true,
                "hasPreviousPage": false,
                "endCursor": encode_cursor(1)
            }
        })
    );
}

#[tokio::test]
async fn test_invalid_cursor_is_field_error() {
    let response = run(
        fleet(""),
        "{ ships(after: \"nope\") { edges { cursor } } }",
        RequestContext::new(),
    )
    .await;
    assert!(
        response["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("Invalid cursor")
    );
}

#[test]
fn test_connection_types_in_sdl() {
    let sdl = fleet("").build().unwrap().sdl();
    assert!(sdl.contains("type ShipConnection"));
    assert!(sdl.contains("edges: [ShipEdge!]!"));
    assert!(sdl.contains("pageInfo: PageInfo!"));
    assert!(sdl.contains("hasNextPage: Boolean!"));
    assert!(sdl.contains("introduceShip(input: IntroduceShipInput!): IntroduceShipPayload!"));
}

#[tokio::test]
async fn test_relay_mutation_echoes_client_mutation_id() {
    let response = run(
        fleet(""),
        "mutation { introduceShip(input: { shipName: \"B-Wing\", clientMutationId: \"m1\" }) { ship clientMutationId } }",
        RequestContext::new(),
    )
    .await;
    assert_eq!(
        response["data"],
        json!({ "introduceShip": { "ship": "B-Wing", "clientMutationId": "m1" } })
    );
}

#[test]
fn test_client_mutation_id_policy() {
    let required = fleet("[relay]\nclient_mutation_id = \"required\"\n").build().unwrap().sdl();
    assert!(required.contains("clientMutationId: ID!"));

    let omitted = fleet("[relay]\nclient_mutation_id = \"omit\"\n").build().unwrap().sdl();
    assert!(!omitted.contains("clientMutationId"));
}

#[test]
fn test_custom_relay_names() {
    let sdl = fleet("[relay]\ncursor_field_name = \"token\"\npage_info_type_name = \"Paging\"\n")
        .build()
        .unwrap()
        .sdl();
    assert!(sdl.contains("type Paging"));
    assert!(sdl.contains("token: String!"));
}
