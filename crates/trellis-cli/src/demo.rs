//! The bundled Star Wars schema.
//!
//! Exercises every kind of type the builder supports: an interface with two
//! implementers, a union, an enum with internal values, a Relay connection
//! and mutation, and fields carrying scope, visibility and tracing metadata
//! for the built-in plugins.

use serde_json::json;
use trellis_core::{
    BuilderOptions, EnumTypeOptions, EnumValueOptions, EnumValues, InterfaceTypeOptions,
    ObjectTypeOptions, ResolveParams, SchemaBuilder, UnionTypeOptions, Value, json_to_value,
    resolver,
};
use trellis_plugins::{
    AuthScopes, RelayBuilderExt, Traced, Visibility, array_connection, builtin_registry,
    decode_global_id, encode_global_id, with_connection_args,
};

const EMPIRE: i32 = 5;

fn characters() -> serde_json::Value {
    json!([
        {
            "__typename": "Human", "id": "1000", "name": "Luke Skywalker",
            "friends": ["1002", "1003", "2000", "2001"], "appearsIn": [4, 5, 6],
            "homePlanet": "Tatooine", "mass": 77.0
        },
        {
            "__typename": "Human", "id": "1001", "name": "Darth Vader",
            "friends": ["1004"], "appearsIn": [4, 5, 6],
            "homePlanet": "Tatooine", "mass": 136.0
        },
        {
            "__typename": "Human", "id": "1002", "name": "Han Solo",
            "friends": ["1000", "1003", "2001"], "appearsIn": [4, 5, 6],
            "homePlanet": null, "mass": 80.0
        },
        {
            "__typename": "Human", "id": "1003", "name": "Leia Organa",
            "friends": ["1000", "1002", "2000", "2001"], "appearsIn": [4, 5, 6],
            "homePlanet": "Alderaan", "mass": 49.0
        },
        {
            "__typename": "Human", "id": "1004", "name": "Wilhuff Tarkin",
            "friends": ["1001"], "appearsIn": [4],
            "homePlanet": null, "mass": null
        },
        {
            "id": "2000", "name": "C-3PO",
            "friends": ["1000", "1002", "1003", "2001"], "appearsIn": [4, 5, 6],
            "primaryFunction": "Protocol"
        },
        {
            "id": "2001", "name": "R2-D2",
            "friends": ["1000", "1002", "1003"], "appearsIn": [4, 5, 6],
            "primaryFunction": "Astromech"
        }
    ])
}

fn starships() -> serde_json::Value {
    json!([
        { "__typename": "Starship", "id": "3000", "name": "Millennium Falcon", "length": 34.37 },
        { "__typename": "Starship", "id": "3001", "name": "X-Wing", "length": 12.5 },
        { "__typename": "Starship", "id": "3002", "name": "TIE Advanced x1", "length": 9.2 },
        { "__typename": "Starship", "id": "3003", "name": "Imperial shuttle", "length": 20.0 }
    ])
}

fn records(all: serde_json::Value) -> Vec<serde_json::Value> {
    match all {
        serde_json::Value::Array(items) => items,
        _ => Vec::new(),
    }
}

fn find(all: serde_json::Value, id: &str) -> Option<Value> {
    records(all)
        .into_iter()
        .find(|item| item["id"] == id)
        .map(json_to_value)
}

fn find_character(id: &str) -> Option<Value> {
    find(characters(), id)
}

fn string_arg<'a>(params: &'a ResolveParams, name: &str) -> Option<&'a str> {
    match params.arg(name) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

async fn friends(params: ResolveParams) -> async_graphql::Result<Value> {
    let Some(Value::List(ids)) = params.parent_field("friends") else {
        return Ok(Value::List(Vec::new()));
    };
    Ok(Value::List(
        ids.iter()
            .filter_map(|id| match id {
                Value::String(id) => find_character(id),
                _ => None,
            })
            .collect(),
    ))
}

async fn search(params: ResolveParams) -> async_graphql::Result<Value> {
    let text = string_arg(&params, "text").unwrap_or_default().to_lowercase();
    let hits = records(characters())
        .into_iter()
        .chain(records(starships()))
        .filter(|item| {
            item["name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(&text))
        })
        .map(json_to_value)
        .collect();
    Ok(Value::List(hits))
}

/// A builder holding the Star Wars schema, resolving `options.plugins`
/// against the built-in plugins.
///
/// # Errors
///
/// Fails only on definition errors, which would be a bug in this module.
pub fn builder(options: BuilderOptions) -> trellis_core::Result<SchemaBuilder> {
    let cursor_field = options.relay.cursor_field_name.clone();
    let mut builder = SchemaBuilder::with_registry(options, builtin_registry());

    let episode = builder.enum_type(
        "Episode",
        EnumTypeOptions::new(
            EnumValues::new()
                .value("NEWHOPE", EnumValueOptions::new().value(4).description("Released in 1977."))
                .value("EMPIRE", EnumValueOptions::new().value(EMPIRE).description("Released in 1980."))
                .value("JEDI", EnumValueOptions::new().value(6).description("Released in 1983.")),
        )
        .description("One of the films in the Star Wars trilogy"),
    )?;

    let character = builder.interface_ref("Character")?;
    character.implement(
        &mut builder,
        InterfaceTypeOptions::new()
            .description("A character in the Star Wars trilogy")
            .fields({
                let character = character.clone();
                let episode = episode.clone();
                move |t| {
                    [
                        ("id", t.expose_id("id").nullable(false)),
                        ("name", t.expose_string("name").extension(Traced)),
                        ("friends", t.list_field(&character).resolve(friends)),
                        ("appearsIn", t.expose_list("appearsIn", &episode)),
                    ]
                }
            }),
    )?;

    let human = builder.object_type(
        "Human",
        ObjectTypeOptions::new()
            .interface(&character)
            .description("A humanoid creature in the Star Wars universe")
            .fields(|t| {
                [
                    ("homePlanet", t.expose_string("homePlanet")),
                    ("mass", t.expose_float("mass").extension(Visibility::flag("beta"))),
                    (
                        "secretBackstory",
                        t.string()
                            .extension(AuthScopes::any(["jedi"]))
                            .resolve(|_| async { Ok(Value::from("Raised on a moisture farm")) }),
                    ),
                ]
            }),
    )?;

    let droid = builder.object_type(
        "Droid",
        ObjectTypeOptions::new()
            .interface(&character)
            .description("A mechanical creature in the Star Wars universe")
            .is_type_of(|value| trellis_core::resolve::property(value, "primaryFunction").is_some())
            .fields(|t| [("primaryFunction", t.expose_string("primaryFunction"))]),
    )?;

    let starship = builder.object_type(
        "Starship",
        ObjectTypeOptions::new().fields(|t| {
            [
                (
                    "id",
                    t.id().nullable(false).resolve(|params| async move {
                        let id = match params.parent_field("id") {
                            Some(Value::String(id)) => id.clone(),
                            _ => return Ok(Value::Null),
                        };
                        Ok(Value::String(encode_global_id("Starship", &id)))
                    }),
                ),
                ("name", t.expose_string("name")),
                ("length", t.expose_float("length")),
            ]
        }),
    )?;

    let search_result = builder.union_type(
        "SearchResult",
        UnionTypeOptions::new()
            .member(&human)
            .member(&droid)
            .member(&starship),
    )?;

    let ships = builder.connection_type("Starship", &starship)?;

    builder.query_fields({
        let starship = starship.clone();
        move |t| {
            [
                (
                    "hero",
                    t.field(&character)
                        .description("The hero of the given episode, R2-D2 by default")
                        .arg("episode", t.arg(&episode))
                        .resolve(|params| async move {
                            let id = match params.arg("episode") {
                                Some(value) if *value == Value::from(EMPIRE) => "1000",
                                _ => "2001",
                            };
                            Ok(find_character(id).unwrap_or(Value::Null))
                        }),
                ),
                (
                    "human",
                    t.field(&human)
                        .arg("id", t.arg_id().required())
                        .resolve(|params| async move {
                            Ok(string_arg(&params, "id").and_then(find_character).unwrap_or(Value::Null))
                        }),
                ),
                (
                    "droid",
                    t.field(&droid)
                        .arg("id", t.arg_id().required())
                        .resolve(|params| async move {
                            Ok(string_arg(&params, "id").and_then(find_character).unwrap_or(Value::Null))
                        }),
                ),
                (
                    "search",
                    t.list_field(&search_result)
                        .arg("text", t.arg_string().required())
                        .resolve(search),
                ),
                (
                    "starship",
                    t.field(&starship)
                        .arg("id", t.arg_id().required())
                        .resolve(|params| async move {
                            let found = string_arg(&params, "id")
                                .and_then(decode_global_id)
                                .filter(|global| global.type_name == "Starship")
                                .and_then(|global| find(starships(), &global.id));
                            Ok(found.unwrap_or(Value::Null))
                        }),
                ),
                (
                    "starships",
                    with_connection_args(t, t.field(&ships).nullable(false)).resolver(
                        array_connection(cursor_field, |_| async {
                            Ok(records(starships()).into_iter().map(json_to_value).collect())
                        }),
                    ),
                ),
            ]
        }
    })?;

    builder.relay_mutation_field(
        "introduceShip",
        |t| [("shipName", t.string().required())],
        move |t| [("ship", t.expose("ship", &starship))],
        resolver(|params| async move {
            let name = params
                .arg("input")
                .and_then(|input| trellis_core::resolve::property(input, "shipName"))
                .cloned()
                .unwrap_or(Value::Null);
            let ship = json_to_value(json!({
                "__typename": "Starship",
                "id": "3100",
                "name": name.into_json()?,
                "length": null
            }));
            Ok(json_to_value(json!({ "ship": ship.into_json()? })))
        }),
    )?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::RequestContext;
    use trellis_plugins::GrantedScopes;

    async fn query(options: BuilderOptions, query: &str, ctx: RequestContext) -> serde_json::Value {
        let schema = builder(options).unwrap().build().unwrap();
        serde_json::to_value(schema.execute(query, ctx).await).unwrap()
    }

    fn with_plugins(toml: &str) -> BuilderOptions {
        BuilderOptions::from_toml_str(toml).unwrap()
    }

    #[tokio::test]
    async fn test_hero_by_episode() {
        let response = query(
            BuilderOptions::default(),
            "{ empire: hero(episode: EMPIRE) { __typename name appearsIn } default: hero { __typename name } }",
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"],
            json!({
                "empire": {
                    "__typename": "Human",
                    "name": "Luke Skywalker",
                    "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"]
                },
                "default": { "__typename": "Droid", "name": "R2-D2" }
            })
        );
    }

    #[tokio::test]
    async fn test_friends_across_implementers() {
        let response = query(
            BuilderOptions::default(),
            "{ human(id: \"1002\") { friends { name ... on Droid { primaryFunction } } } }",
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"]["human"]["friends"],
            json!([
                { "name": "Luke Skywalker" },
                { "name": "Leia Organa" },
                { "name": "R2-D2", "primaryFunction": "Astromech" }
            ])
        );
    }

    #[tokio::test]
    async fn test_search_union() {
        let response = query(
            BuilderOptions::default(),
            "{ search(text: \"wing\") { __typename ... on Starship { name } } }",
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"]["search"],
            json!([{ "__typename": "Starship", "name": "X-Wing" }])
        );
    }

    #[tokio::test]
    async fn test_starship_global_id_round_trip() {
        let id = encode_global_id("Starship", "3002");
        let response = query(
            BuilderOptions::default(),
            &format!("{{ starship(id: \"{id}\") {{ id name }} }}"),
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"]["starship"],
            json!({ "id": id, "name": "TIE Advanced x1" })
        );
    }

    #[tokio::test]
    async fn test_starships_connection() {
        let response = query(
            BuilderOptions::default(),
            "{ starships(last: 1) { edges { node { name } } pageInfo { hasPreviousPage hasNextPage } } }",
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"]["starships"],
            json!({
                "edges": [{ "node": { "name": "Imperial shuttle" } }],
                "pageInfo": { "hasPreviousPage": true, "hasNextPage": false }
            })
        );
    }

    #[tokio::test]
    async fn test_introduce_ship() {
        let response = query(
            BuilderOptions::default(),
            "mutation { introduceShip(input: { shipName: \"Slave I\", clientMutationId: \"abc\" }) { ship { name } clientMutationId } }",
            RequestContext::new(),
        )
        .await;
        assert_eq!(
            response["data"],
            json!({ "introduceShip": { "ship": { "name": "Slave I" }, "clientMutationId": "abc" } })
        );
    }

    #[tokio::test]
    async fn test_secret_backstory_needs_scope() {
        let options = || with_plugins("plugins = [\"tracing\", \"scopeAuth\"]");
        let q = "{ human(id: \"1000\") { secretBackstory } }";

        let denied = query(options(), q, RequestContext::new()).await;
        assert_eq!(denied["errors"][0]["extensions"]["code"], "UNAUTHORIZED");

        let ctx = RequestContext::new().with(GrantedScopes::new(["jedi"]));
        let allowed = query(options(), q, ctx).await;
        assert_eq!(
            allowed["data"]["human"]["secretBackstory"],
            "Raised on a moisture farm"
        );
    }

    #[test]
    fn test_visibility_hides_beta_fields() {
        let hidden = builder(with_plugins("plugins = [\"visibility\"]"))
            .unwrap()
            .build()
            .unwrap()
            .sdl();
        assert!(!hidden.contains("mass"));

        let shown = builder(with_plugins("plugins = [\"visibility\"]\n[visibility]\nenabled = [\"beta\"]"))
            .unwrap()
            .build()
            .unwrap()
            .sdl();
        assert!(shown.contains("mass: Float"));
    }

    #[test]
    fn test_sdl_is_stable() {
        let first = builder(BuilderOptions::default()).unwrap().build().unwrap().sdl();
        let second = builder(BuilderOptions::default()).unwrap().build().unwrap().sdl();
        assert_eq!(first, second);
        assert!(first.contains("union SearchResult = Human | Droid | Starship"));
        assert!(first.contains("type StarshipConnection"));
    }
}
