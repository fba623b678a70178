//! Input shapes and recursive input detection.
//!
//! Every input object gets an [`InputShape`] describing how incoming values
//! are coerced before they reach a resolver (enum names become internal
//! values). Shapes of non-recursive input objects are inlined into the
//! shapes that use them. An input object that can reach a cycle is declared
//! by reference instead, so generating its shape terminates.

use std::sync::Arc;

use async_graphql::{Name, Value};
use indexmap::{IndexMap, IndexSet};

/// Mapping between enum value names and internal values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMapping {
    type_name: String,
    values: Vec<(String, Value)>,
}

impl EnumMapping {
    pub(crate) fn new(type_name: impl Into<String>, values: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            values,
        }
    }

    /// The enum type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the value whose internal value is `internal`.
    #[must_use]
    pub fn name_of(&self, internal: &Value) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, value)| value == internal)
            .map(|(name, _)| name.as_str())
    }

    /// Internal value of the value called `name`.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(value_name, _)| value_name == name)
            .map(|(_, value)| value)
    }
}

/// How an input value is coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum InputShape {
    /// Passed through unchanged.
    Scalar(String),
    /// Enum name mapped to its internal value.
    Enum(Arc<EnumMapping>),
    /// Each item coerced by the inner shape.
    List(Box<InputShape>),
    /// Fields coerced by name; unknown fields are kept.
    Object {
        name: String,
        fields: IndexMap<String, InputShape>,
    },
    /// A recursive input object, looked up in the shape table.
    Ref(String),
}

/// Shapes of every input object, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct InputShapes {
    shapes: IndexMap<String, InputShape>,
    recursive: IndexSet<String>,
}

impl InputShapes {
    /// The shape of input object `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InputShape> {
        self.shapes.get(name)
    }

    /// Whether input object `name` is declared by reference.
    #[must_use]
    pub fn is_recursive(&self, name: &str) -> bool {
        self.recursive.contains(name)
    }

    /// Recursive input object names, in registration order.
    pub fn recursive(&self) -> impl Iterator<Item = &str> {
        self.recursive.iter().map(String::as_str)
    }

    /// Coerces `value` according to `shape`.
    #[must_use]
    pub fn coerce(&self, shape: &InputShape, value: Value) -> Value {
        match (shape, value) {
            (_, Value::Null) => Value::Null,
            (InputShape::Scalar(_), value) => value,
            (InputShape::Enum(mapping), value) => {
                let name = match &value {
                    Value::Enum(name) => Some(name.as_str()),
                    Value::String(name) => Some(name.as_str()),
                    _ => None,
                };
                let mapped = name.and_then(|name| mapping.value_of(name)).cloned();
                mapped.unwrap_or(value)
            }
            (InputShape::List(inner), Value::List(items)) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.coerce(inner, item))
                    .collect(),
            ),
            // A single value given for a list input is coerced as one item.
            (InputShape::List(inner), value) => self.coerce(inner, value),
            (InputShape::Object { fields, .. }, Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| {
                        let value = match fields.get(key.as_str()) {
                            Some(shape) => self.coerce(shape, value),
                            None => value,
                        };
                        (key, value)
                    })
                    .collect(),
            ),
            (InputShape::Ref(name), value) => match self.shapes.get(name) {
                Some(shape) => self.coerce(shape, value),
                None => value,
            },
            (_, value) => value,
        }
    }

    /// Converts a default value written with enum names as strings into
    /// the literal the engine expects.
    #[must_use]
    pub fn default_literal(&self, shape: &InputShape, value: Value) -> Value {
        match (shape, value) {
            (InputShape::Enum(_), Value::String(name)) => Value::Enum(Name::new(name)),
            (InputShape::List(inner), Value::List(items)) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.default_literal(inner, item))
                    .collect(),
            ),
            (InputShape::Object { fields, .. }, Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| {
                        let value = match fields.get(key.as_str()) {
                            Some(shape) => self.default_literal(shape, value),
                            None => value,
                        };
                        (key, value)
                    })
                    .collect(),
            ),
            (InputShape::Ref(name), value) => match self.shapes.get(name) {
                Some(shape) => self.default_literal(shape, value),
                None => value,
            },
            (_, value) => value,
        }
    }
}

/// Reference from an input field to a named type.
#[derive(Debug, Clone)]
pub(crate) struct InputFieldTarget {
    pub name: String,
    pub list: bool,
}

/// What the shape builder knows about each named input type.
#[derive(Debug, Clone)]
pub(crate) enum NamedInput {
    Scalar,
    Enum(Arc<EnumMapping>),
    Object(IndexMap<String, InputFieldTarget>),
}

/// Finds input objects whose fields can reach a cycle.
///
/// Runs a depth-first search from each input object, tracking the names on
/// the current path. Reaching a name already on the path marks the
/// originating type recursive. This covers direct self-reference and mutual
/// references alike.
pub(crate) fn find_recursive(inputs: &IndexMap<String, NamedInput>) -> IndexSet<String> {
    let mut recursive = IndexSet::new();
    for origin in inputs.keys() {
        let mut path = IndexSet::new();
        let mut finished = IndexSet::new();
        if reaches_cycle(origin, inputs, &mut path, &mut finished) {
            recursive.insert(origin.clone());
        }
    }
    recursive
}

fn reaches_cycle(
    name: &str,
    inputs: &IndexMap<String, NamedInput>,
    path: &mut IndexSet<String>,
    finished: &mut IndexSet<String>,
) -> bool {
    if path.contains(name) {
        return true;
    }
    if finished.contains(name) {
        return false;
    }
    let Some(NamedInput::Object(fields)) = inputs.get(name) else {
        return false;
    };

    path.insert(name.to_string());
    let found = fields
        .values()
        .any(|target| reaches_cycle(&target.name, inputs, path, finished));
    path.shift_remove(name);
    if !found {
        finished.insert(name.to_string());
    }
    found
}

/// Builds the shape table for every input object in `inputs`.
pub(crate) fn build_shapes(inputs: &IndexMap<String, NamedInput>) -> InputShapes {
    let recursive = find_recursive(inputs);
    let mut table = InputShapes {
        shapes: IndexMap::new(),
        recursive,
    };
    for (name, input) in inputs {
        if let NamedInput::Object(fields) = input {
            let shape = object_shape(name, fields, inputs, &table.recursive);
            table.shapes.insert(name.clone(), shape);
        }
    }
    table
}

/// Shape of a field referring to `target`, inlining non-recursive inputs.
pub(crate) fn field_shape(
    target: &InputFieldTarget,
    inputs: &IndexMap<String, NamedInput>,
    recursive: &IndexSet<String>,
) -> InputShape {
    let named = match inputs.get(&target.name) {
        Some(NamedInput::Enum(mapping)) => InputShape::Enum(Arc::clone(mapping)),
        Some(NamedInput::Object(_)) if recursive.contains(&target.name) => {
            InputShape::Ref(target.name.clone())
        }
        Some(NamedInput::Object(fields)) => object_shape(&target.name, fields, inputs, recursive),
        Some(NamedInput::Scalar) | None => InputShape::Scalar(target.name.clone()),
    };
    if target.list {
        InputShape::List(Box::new(named))
    } else {
        named
    }
}

fn object_shape(
    name: &str,
    fields: &IndexMap<String, InputFieldTarget>,
    inputs: &IndexMap<String, NamedInput>,
    recursive: &IndexSet<String>,
) -> InputShape {
    InputShape::Object {
        name: name.to_string(),
        fields: fields
            .iter()
            .map(|(field, target)| (field.clone(), field_shape(target, inputs, recursive)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, list: bool) -> InputFieldTarget {
        InputFieldTarget {
            name: name.to_string(),
            list,
        }
    }

    fn object(fields: &[(&str, InputFieldTarget)]) -> NamedInput {
        NamedInput::Object(
            fields
                .iter()
                .map(|(n, t)| ((*n).to_string(), t.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_self_reference_detected() {
        let mut inputs = IndexMap::new();
        inputs.insert("String".to_string(), NamedInput::Scalar);
        inputs.insert(
            "Tree".to_string(),
            object(&[("value", target("String", false)), ("children", target("Tree", true))]),
        );
        let recursive = find_recursive(&inputs);
        assert!(recursive.contains("Tree"));
    }

    #[test]
    fn test_mutual_reference_detected() {
        let mut inputs = IndexMap::new();
        inputs.insert("A".to_string(), object(&[("b", target("B", false))]));
        inputs.insert("B".to_string(), object(&[("a", target("A", false))]));
        inputs.insert("C".to_string(), object(&[("x", target("Int", false))]));
        let recursive = find_recursive(&inputs);
        assert_eq!(recursive.iter().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[test]
    fn test_non_recursive_inputs_are_inlined() {
        let mut inputs = IndexMap::new();
        inputs.insert("Int".to_string(), NamedInput::Scalar);
        inputs.insert("Range".to_string(), object(&[("min", target("Int", false))]));
        inputs.insert("Filter".to_string(), object(&[("range", target("Range", false))]));

        let shapes = build_shapes(&inputs);
        let Some(InputShape::Object { fields, .. }) = shapes.get("Filter") else {
            panic!("expected object shape");
        };
        assert!(matches!(fields["range"], InputShape::Object { .. }));
        assert_eq!(shapes.recursive().count(), 0);
    }

    #[test]
    fn test_recursive_coercion_three_levels() {
        let episode = Arc::new(EnumMapping::new(
            "Episode",
            vec![("JEDI".to_string(), Value::from(6))],
        ));
        let mut inputs = IndexMap::new();
        inputs.insert("Episode".to_string(), NamedInput::Enum(episode));
        inputs.insert(
            "Tree".to_string(),
            object(&[("episode", target("Episode", false)), ("children", target("Tree", true))]),
        );
        let shapes = build_shapes(&inputs);
        let Some(InputShape::Object { fields, .. }) = shapes.get("Tree") else {
            panic!("expected object shape");
        };
        assert_eq!(
            fields["children"],
            InputShape::List(Box::new(InputShape::Ref("Tree".into())))
        );

        let leaf = Value::Object(
            [(Name::new("episode"), Value::Enum(Name::new("JEDI")))]
                .into_iter()
                .collect(),
        );
        let middle = Value::Object(
            [(Name::new("children"), Value::List(vec![leaf]))]
                .into_iter()
                .collect(),
        );
        let root = Value::Object(
            [(Name::new("children"), Value::List(vec![middle]))]
                .into_iter()
                .collect(),
        );

        let coerced = shapes.coerce(&InputShape::Ref("Tree".into()), root);
        let json = coerced.into_json().unwrap();
        assert_eq!(json["children"][0]["children"][0]["episode"], 6);
    }

    #[test]
    fn test_enum_mapping_lookup() {
        let mapping = EnumMapping::new(
            "Episode",
            vec![
                ("NEWHOPE".to_string(), Value::from(4)),
                ("EMPIRE".to_string(), Value::from(5)),
            ],
        );
        assert_eq!(mapping.name_of(&Value::from(5)), Some("EMPIRE"));
        assert_eq!(mapping.value_of("NEWHOPE"), Some(&Value::from(4)));
        assert!(mapping.name_of(&Value::from(9)).is_none());
    }
}
