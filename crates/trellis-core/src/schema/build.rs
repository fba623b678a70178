//! The build pass.
//!
//! Runs once per builder, after the store is frozen:
//!
//! 1. instantiate plugins and call `before_build`
//! 2. run the type pipeline, then evaluate the queued field factories
//! 3. resolve interfaces and copy inherited fields onto implementers
//! 4. run the field, argument, input field and enum value pipelines
//! 5. resolve every field type against the store
//! 6. synthesize discriminators and wrap resolvers
//! 7. lower into the engine and call `after_build`
//!
//! Nothing is lowered until every reference has been resolved, so a failing
//! build never produces a partial schema.

use std::sync::Arc;
use std::time::Instant;

use async_graphql::Value;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use super::input_shape::{EnumMapping, InputFieldTarget, NamedInput, build_shapes, field_shape};
use super::lower::{LoweredField, LoweredType, LoweringContext, lower};
use super::BuiltSchema;
use crate::builder::{FieldBuilder, FieldsFactory, InputFieldBuilder, SchemaBuilder};
use crate::config::BuilderOptions;
use crate::error::SchemaError;
use crate::plugin::{Plugin, PluginHandle};
use crate::refs::{RefId, TypeKind, TypeParam, is_valid_graphql_name};
use crate::resolve::{IsTypeOfFn, ResolveTypeFn, identity_resolver, property, property_resolver};
use crate::store::ConfigStore;
use crate::types::{
    EnumValueConfig, FieldConfig, FieldType, InputFieldConfig, InputFieldKind, KindOptions, ResolvedType,
    TypeConfig,
};
use crate::Result;

/// A type while the build pass works on it.
struct Draft {
    id: RefId,
    config: TypeConfig,
    interfaces: Vec<String>,
    members: Vec<String>,
    fields: IndexMap<String, FieldConfig>,
    input_fields: IndexMap<String, InputFieldConfig>,
}

impl Draft {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> TypeKind {
        self.config.kind
    }
}

struct Chain {
    plugins: Vec<Arc<dyn Plugin>>,
    handles: Vec<PluginHandle>,
}

impl Chain {
    /// Pairs in reverse registration order, so folding a wrapper over them
    /// leaves the first-registered plugin outermost.
    fn wrapping_order(&self) -> impl Iterator<Item = (&Arc<dyn Plugin>, &PluginHandle)> {
        self.plugins.iter().zip(&self.handles).rev()
    }
}

pub(crate) fn build(builder: SchemaBuilder) -> Result<BuiltSchema> {
    let started = Instant::now();
    let (options, registry, extra, mut store) = builder.into_parts();
    options.validate()?;

    let mut plugins = registry.instantiate_all(&options)?;
    plugins.extend(extra);
    check_plugin_names(&plugins)?;
    let chain = Chain {
        handles: plugins.iter().cloned().map(PluginHandle::new).collect(),
        plugins,
    };
    info!(
        plugins = ?chain.handles.iter().map(PluginHandle::name).collect::<Vec<_>>(),
        "Building schema"
    );

    store.freeze();
    for plugin in &chain.plugins {
        plugin.before_build(&store)?;
    }
    check_roots(&store)?;

    let mut drafts = type_pipeline(&store, &chain)?;
    evaluate_factories(&mut store, &mut drafts)?;
    resolve_interfaces(&store, &mut drafts)?;
    inherit_fields(&mut drafts);
    field_pipelines(&chain, &mut drafts)?;
    resolve_types(&store, &options, &mut drafts)?;

    for draft in drafts.values() {
        if draft.kind() == TypeKind::Object {
            for interface in &draft.interfaces {
                store.link_implementer(interface, draft.name());
            }
        }
    }

    let resolve_types = discriminators(&chain, &drafts);
    let enums = enum_mappings(&drafts);
    let inputs = named_inputs(&drafts, &enums);
    let shapes = Arc::new(build_shapes(&inputs));
    let recursive: IndexSet<String> = shapes.recursive().map(str::to_string).collect();
    if !recursive.is_empty() {
        debug!(types = ?recursive, "Recursive input objects declared by reference");
    }

    let mut lowered = Vec::with_capacity(drafts.len());
    for draft in drafts.values() {
        lowered.push(lower_draft(draft, &chain, &inputs, &recursive)?);
    }

    let schema = lower(
        &lowered,
        &LoweringContext {
            shapes: Arc::clone(&shapes),
            enums: &enums,
            resolve_types: &resolve_types,
            limits: &options.limits,
        },
    )?;

    let built = BuiltSchema::new(
        schema,
        shapes,
        lowered
            .into_iter()
            .map(|ty| {
                let fields = ty
                    .fields
                    .into_iter()
                    .map(|(name, field)| (name, field.config))
                    .collect();
                (ty.config.name.clone(), (ty.config, fields))
            })
            .collect(),
    );

    for plugin in &chain.plugins {
        plugin.after_build(&built)?;
    }

    info!(
        types = built.type_names().count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Schema built"
    );
    Ok(built)
}

/// Request data is keyed by plugin name, so every name in the chain must be
/// unique.
fn check_plugin_names(plugins: &[Arc<dyn Plugin>]) -> Result<()> {
    for (i, plugin) in plugins.iter().enumerate() {
        if plugins[..i].iter().any(|earlier| earlier.name() == plugin.name()) {
            return Err(SchemaError::Config(format!(
                "plugin `{}` is registered more than once",
                plugin.name()
            )));
        }
    }
    Ok(())
}

fn check_roots(store: &ConfigStore) -> Result<()> {
    match store.lookup(&TypeParam::from("Query"), Some(TypeKind::Query), "schema") {
        Ok(_) => {}
        Err(SchemaError::MissingType { .. }) => return Err(SchemaError::MissingQueryType),
        Err(e) => return Err(e),
    }
    if let Some(id) = store.orphaned_fields().into_iter().next() {
        let name = store.ref_info(id).map(|(name, _)| name.to_string()).unwrap_or_default();
        return Err(SchemaError::UnimplementedRef {
            name,
            referenced_by: "queued fields".to_string(),
        });
    }
    Ok(())
}

fn type_pipeline(store: &ConfigStore, chain: &Chain) -> Result<IndexMap<String, Draft>> {
    let mut drafts = IndexMap::new();
    for id in store.registered_ids() {
        let original = store.config(id, "build")?;
        if original.is_builtin() {
            continue;
        }
        let name = original.name.clone();
        let kind = original.kind;
        let mut config = original.clone();
        for plugin in &chain.plugins {
            config = plugin.on_type_config(config)?;
            if config.name != name || config.kind != kind {
                return Err(SchemaError::plugin(
                    plugin.name(),
                    format!("type `{name}` may not be renamed or change kind"),
                ));
            }
        }
        drafts.insert(
            name,
            Draft {
                id,
                config,
                interfaces: Vec::new(),
                members: Vec::new(),
                fields: IndexMap::new(),
                input_fields: IndexMap::new(),
            },
        );
    }
    Ok(drafts)
}

fn check_field_name(coordinate: &str, name: &str) -> Result<()> {
    if is_valid_graphql_name(name) && !name.starts_with("__") {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            name: format!("{coordinate}.{name}"),
        })
    }
}

fn evaluate_factories(store: &mut ConfigStore, drafts: &mut IndexMap<String, Draft>) -> Result<()> {
    for draft in drafts.values_mut() {
        let parent = draft.config.name.clone();
        let kind = draft.kind();
        for factory in store.take_fields(draft.id) {
            match factory {
                FieldsFactory::Output(f) if kind.has_fields() => {
                    let builder = FieldBuilder::new(parent.as_str(), kind);
                    for (name, field) in f(&builder) {
                        check_field_name(&parent, &name)?;
                        if draft.fields.contains_key(&name) {
                            return Err(SchemaError::DuplicateField {
                                type_name: parent.clone(),
                                field: name,
                            });
                        }
                        let config = field.into_config(&name, &parent, kind)?;
                        for arg in config.args.keys() {
                            check_field_name(&config.coordinate(), arg)?;
                        }
                        draft.fields.insert(name, config);
                    }
                }
                FieldsFactory::Input(f) if kind == TypeKind::InputObject => {
                    let builder = InputFieldBuilder::new(parent.as_str());
                    for (name, field) in f(&builder) {
                        check_field_name(&parent, &name)?;
                        if draft.input_fields.contains_key(&name) {
                            return Err(SchemaError::DuplicateField {
                                type_name: parent.clone(),
                                field: name,
                            });
                        }
                        let config = field.into_config(&name, &parent, InputFieldKind::InputField);
                        draft.input_fields.insert(name, config);
                    }
                }
                _ => {
                    return Err(SchemaError::InvalidFieldType {
                        coordinate: parent.clone(),
                        reason: format!("a {kind} cannot hold these fields"),
                    });
                }
            }
        }
        debug!(
            type_name = %parent,
            fields = draft.fields.len() + draft.input_fields.len(),
            "Evaluated field factories"
        );
    }
    Ok(())
}

/// Looks up the name and kind behind a parameter.
fn lookup(store: &ConfigStore, param: &TypeParam, referenced_by: &str) -> Result<(String, TypeKind)> {
    let id = store.resolve(param, referenced_by)?;
    let config = store.config(id, referenced_by)?;
    Ok((config.name.clone(), config.kind))
}

fn resolve_interfaces(store: &ConfigStore, drafts: &mut IndexMap<String, Draft>) -> Result<()> {
    let mut direct: IndexMap<String, Vec<String>> = IndexMap::new();
    for draft in drafts.values() {
        let mut names = Vec::new();
        for param in &draft.config.interfaces {
            let (name, kind) = lookup(store, param, draft.name())?;
            if kind != TypeKind::Interface {
                return Err(SchemaError::TypeKindMismatch {
                    name,
                    expected: TypeKind::Interface.to_string(),
                    actual: kind,
                });
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        direct.insert(draft.name().to_string(), names);
    }

    for draft in drafts.values_mut() {
        let mut closure: Vec<String> = Vec::new();
        let mut queue: Vec<String> = direct.get(draft.name()).cloned().unwrap_or_default();
        let mut next = 0;
        while next < queue.len() {
            let name = queue[next].clone();
            next += 1;
            if name == draft.config.name || closure.contains(&name) {
                continue;
            }
            if let Some(parents) = direct.get(&name) {
                queue.extend(parents.iter().cloned());
            }
            closure.push(name);
        }
        draft.interfaces = closure;

        if let KindOptions::Union { members, .. } = &draft.config.options {
            let mut names = Vec::new();
            for param in members {
                let (name, kind) = lookup(store, param, &draft.config.name)?;
                if kind != TypeKind::Object {
                    return Err(SchemaError::TypeKindMismatch {
                        name,
                        expected: TypeKind::Object.to_string(),
                        actual: kind,
                    });
                }
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            draft.members = names;
        }
    }
    Ok(())
}

fn inherit_fields(drafts: &mut IndexMap<String, Draft>) {
    let interface_fields: IndexMap<String, IndexMap<String, FieldConfig>> = drafts
        .values()
        .filter(|draft| draft.kind() == TypeKind::Interface)
        .map(|draft| (draft.name().to_string(), draft.fields.clone()))
        .collect();

    for draft in drafts.values_mut() {
        if draft.interfaces.is_empty() {
            continue;
        }
        let mut merged: IndexMap<String, FieldConfig> = IndexMap::new();
        for interface in &draft.interfaces {
            let Some(fields) = interface_fields.get(interface) else {
                continue;
            };
            for (name, field) in fields {
                merged.entry(name.clone()).or_insert_with(|| {
                    let mut field = field.clone();
                    field.parent_type = draft.config.name.clone();
                    field.parent_kind = draft.config.kind;
                    for arg in field.args.values_mut() {
                        arg.parent_type = draft.config.name.clone();
                    }
                    field
                });
            }
        }
        let inherited = merged.len();
        for (name, field) in std::mem::take(&mut draft.fields) {
            merged.insert(name, field);
        }
        draft.fields = merged;
        debug!(type_name = %draft.config.name, inherited, "Inherited interface fields");
    }
}

fn field_pipelines(chain: &Chain, drafts: &mut IndexMap<String, Draft>) -> Result<()> {
    for draft in drafts.values_mut() {
        let mut fields = IndexMap::with_capacity(draft.fields.len());
        for (name, field) in std::mem::take(&mut draft.fields) {
            let Some(mut field) = run_output_pipeline(chain, field)? else {
                debug!(field = %format!("{}.{name}", draft.config.name), "Field dropped by plugin");
                continue;
            };
            let mut args = IndexMap::with_capacity(field.args.len());
            for (arg_name, arg) in std::mem::take(&mut field.args) {
                let coordinate = arg.coordinate();
                match run_input_pipeline(chain, arg)? {
                    Some(arg) => {
                        args.insert(arg_name, arg);
                    }
                    None => debug!(argument = %coordinate, "Argument dropped by plugin"),
                }
            }
            field.args = args;
            fields.insert(name, field);
        }
        draft.fields = fields;

        let mut input_fields = IndexMap::with_capacity(draft.input_fields.len());
        for (name, field) in std::mem::take(&mut draft.input_fields) {
            let coordinate = field.coordinate();
            match run_input_pipeline(chain, field)? {
                Some(field) => {
                    input_fields.insert(name, field);
                }
                None => debug!(field = %coordinate, "Input field dropped by plugin"),
            }
        }
        draft.input_fields = input_fields;

        if let KindOptions::Enum { values } = &mut draft.config.options {
            let mut kept = IndexMap::with_capacity(values.len());
            for (name, value) in std::mem::take(values) {
                match run_enum_pipeline(chain, value)? {
                    Some(value) => {
                        kept.insert(name, value);
                    }
                    None => debug!(enum_value = %format!("{}.{name}", draft.config.name), "Enum value dropped by plugin"),
                }
            }
            *values = kept;
        }
    }
    Ok(())
}

fn run_output_pipeline(chain: &Chain, field: FieldConfig) -> Result<Option<FieldConfig>> {
    let mut current = field;
    for plugin in &chain.plugins {
        match plugin.on_output_field_config(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn run_input_pipeline(chain: &Chain, field: InputFieldConfig) -> Result<Option<InputFieldConfig>> {
    let mut current = field;
    for plugin in &chain.plugins {
        match plugin.on_input_field_config(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn run_enum_pipeline(chain: &Chain, value: EnumValueConfig) -> Result<Option<EnumValueConfig>> {
    let mut current = value;
    for plugin in &chain.plugins {
        match plugin.on_enum_value_config(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn resolve_field_type(
    store: &ConfigStore,
    field_type: &FieldType,
    coordinate: &str,
    output: bool,
    options: &BuilderOptions,
) -> Result<ResolvedType> {
    let (name, kind) = lookup(store, &field_type.param, coordinate)?;
    let (allowed, expected) = if output {
        (kind.is_output(), "an output type")
    } else {
        (kind.is_input(), "an input type")
    };
    if !allowed {
        return Err(SchemaError::TypeKindMismatch {
            name,
            expected: format!("{expected} for `{coordinate}`"),
            actual: kind,
        });
    }
    let default_nullable = if output {
        options.default_field_nullability
    } else {
        !options.default_input_field_required
    };
    Ok(ResolvedType {
        name,
        kind,
        list: field_type.list,
        nullable: field_type.nullable.unwrap_or(default_nullable),
        items_nullable: field_type
            .items_nullable
            .unwrap_or(options.default_list_item_nullability),
    })
}

fn resolve_types(store: &ConfigStore, options: &BuilderOptions, drafts: &mut IndexMap<String, Draft>) -> Result<()> {
    for draft in drafts.values_mut() {
        for field in draft.fields.values_mut() {
            let coordinate = field.coordinate();
            field.resolved_type = Some(resolve_field_type(store, &field.field_type, &coordinate, true, options)?);
            for arg in field.args.values_mut() {
                let coordinate = arg.coordinate();
                arg.resolved_type = Some(resolve_field_type(store, &arg.field_type, &coordinate, false, options)?);
            }
        }
        for field in draft.input_fields.values_mut() {
            let coordinate = field.coordinate();
            field.resolved_type = Some(resolve_field_type(store, &field.field_type, &coordinate, false, options)?);
        }
    }
    Ok(())
}

/// Builds the discriminator of every interface and union, then wraps it.
fn discriminators(chain: &Chain, drafts: &IndexMap<String, Draft>) -> IndexMap<String, ResolveTypeFn> {
    let mut resolve_types = IndexMap::new();
    for draft in drafts.values().filter(|d| d.kind().is_abstract()) {
        let base = match draft.config.resolve_type() {
            Some(explicit) => Arc::clone(explicit),
            None => {
                // Registration order, including objects that reach the
                // interface through another interface.
                let candidates: Vec<&Draft> = match draft.kind() {
                    TypeKind::Union => draft.members.iter().filter_map(|name| drafts.get(name)).collect(),
                    _ => drafts
                        .values()
                        .filter(|candidate| candidate.interfaces.iter().any(|i| i == draft.name()))
                        .collect(),
                };
                let candidates = candidates
                    .into_iter()
                    .filter(|candidate| candidate.kind() == TypeKind::Object)
                    .map(|candidate| (candidate.config.name.clone(), candidate.config.is_type_of().cloned()))
                    .collect();
                synthesized_resolve_type(candidates)
            }
        };
        let wrapped = chain
            .wrapping_order()
            .fold(base, |f, (plugin, handle)| plugin.wrap_resolve_type(f, &draft.config, handle));
        resolve_types.insert(draft.config.name.clone(), wrapped);
    }
    resolve_types
}

/// Tries each candidate in order: its `is_type_of` when it has one, otherwise
/// a `__typename` property equal to its name.
fn synthesized_resolve_type(candidates: Vec<(String, Option<IsTypeOfFn>)>) -> ResolveTypeFn {
    Arc::new(move |value, _ctx| {
        candidates
            .iter()
            .find(|(name, is_type_of)| match is_type_of {
                Some(is_type_of) => is_type_of(value),
                None => matches!(property(value, "__typename"), Some(Value::String(t)) if t == name),
            })
            .map(|(name, _)| name.clone())
    })
}

fn enum_mappings(drafts: &IndexMap<String, Draft>) -> IndexMap<String, Arc<EnumMapping>> {
    drafts
        .values()
        .filter_map(|draft| match &draft.config.options {
            KindOptions::Enum { values } => Some((
                draft.config.name.clone(),
                Arc::new(EnumMapping::new(
                    draft.config.name.clone(),
                    values
                        .values()
                        .map(|value| (value.name.clone(), value.value.clone()))
                        .collect(),
                )),
            )),
            _ => None,
        })
        .collect()
}

fn target_of(resolved: Option<&ResolvedType>) -> Option<InputFieldTarget> {
    resolved.map(|resolved| InputFieldTarget {
        name: resolved.name.clone(),
        list: resolved.list,
    })
}

fn named_inputs(drafts: &IndexMap<String, Draft>, enums: &IndexMap<String, Arc<EnumMapping>>) -> IndexMap<String, NamedInput> {
    let mut inputs: IndexMap<String, NamedInput> = enums
        .iter()
        .map(|(name, mapping)| (name.clone(), NamedInput::Enum(Arc::clone(mapping))))
        .collect();
    for draft in drafts.values().filter(|d| d.kind() == TypeKind::InputObject) {
        let fields = draft
            .input_fields
            .iter()
            .filter_map(|(name, field)| target_of(field.resolved_type.as_ref()).map(|t| (name.clone(), t)))
            .collect();
        inputs.insert(draft.config.name.clone(), NamedInput::Object(fields));
    }
    inputs
}

fn lower_draft(
    draft: &Draft,
    chain: &Chain,
    inputs: &IndexMap<String, NamedInput>,
    recursive: &IndexSet<String>,
) -> Result<LoweredType> {
    let mut fields = IndexMap::with_capacity(draft.fields.len());
    for (name, field) in &draft.fields {
        let base = match &field.resolver {
            Some(resolver) => Arc::clone(resolver),
            None if field.is_subscription() => identity_resolver(),
            None => property_resolver(field.name.as_str()),
        };
        let resolver = chain
            .wrapping_order()
            .fold(base, |r, (plugin, handle)| plugin.wrap_resolve(r, field, handle));

        let subscribe = match (&field.subscribe, field.is_subscription()) {
            (Some(subscribe), true) => Some(
                chain
                    .wrapping_order()
                    .fold(Arc::clone(subscribe), |s, (plugin, handle)| plugin.wrap_subscribe(s, field, handle)),
            ),
            (None, true) => {
                return Err(SchemaError::InvalidFieldType {
                    coordinate: field.coordinate(),
                    reason: "subscription fields need an event source".to_string(),
                });
            }
            (Some(_), false) => {
                return Err(SchemaError::InvalidFieldType {
                    coordinate: field.coordinate(),
                    reason: "only subscription fields can subscribe".to_string(),
                });
            }
            (None, false) => None,
        };

        let arg_shapes = field
            .args
            .iter()
            .filter_map(|(arg_name, arg)| {
                target_of(arg.resolved_type.as_ref())
                    .map(|target| (arg_name.clone(), field_shape(&target, inputs, recursive)))
            })
            .collect();

        fields.insert(
            name.clone(),
            LoweredField {
                config: field.clone(),
                resolver,
                subscribe,
                arg_shapes,
            },
        );
    }

    let enum_values = match &draft.config.options {
        KindOptions::Enum { values } => values.clone(),
        _ => IndexMap::new(),
    };

    Ok(LoweredType {
        config: draft.config.clone(),
        interfaces: draft.interfaces.clone(),
        members: draft.members.clone(),
        fields,
        input_fields: draft.input_fields.clone(),
        enum_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use serde_json::json;

    #[test]
    fn test_synthesized_discriminator_prefers_is_type_of() {
        let droid: IsTypeOfFn = Arc::new(|value| property(value, "primaryFunction").is_some());
        let resolve = synthesized_resolve_type(vec![
            ("Human".to_string(), None),
            ("Droid".to_string(), Some(droid)),
        ]);
        let ctx = RequestContext::new();

        let human = crate::resolve::json_to_value(json!({"__typename": "Human"}));
        assert_eq!(resolve(&human, &ctx).as_deref(), Some("Human"));

        let droid = crate::resolve::json_to_value(json!({"primaryFunction": "Astromech"}));
        assert_eq!(resolve(&droid, &ctx).as_deref(), Some("Droid"));

        let unknown = crate::resolve::json_to_value(json!({"name": "?"}));
        assert_eq!(resolve(&unknown, &ctx), None);
    }
}
