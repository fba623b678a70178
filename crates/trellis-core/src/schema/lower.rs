//! Lowering into the async-graphql dynamic schema.
//!
//! By the time a type reaches this module every name is resolved, every
//! plugin has transformed it and every resolver is wrapped. Lowering only
//! translates the result into engine types and adapts resolver calls: the
//! engine's resolver context becomes [`ResolveParams`] on the way in, and the
//! returned [`Value`] becomes a [`FieldValue`] on the way out.

use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, Subscription, SubscriptionField,
    SubscriptionFieldFuture, Union,
};
use async_graphql::{Name, Value};
use futures_util::StreamExt;
use indexmap::IndexMap;
use tracing::{debug, trace};

use super::input_shape::{EnumMapping, InputShape, InputShapes};
use crate::config::EngineLimits;
use crate::context::RequestContext;
use crate::error::SchemaError;
use crate::refs::TypeKind;
use crate::resolve::{ResolveInfo, ResolveParams, ResolveTypeFn, Resolver, Subscriber};
use crate::types::{EnumValueConfig, FieldConfig, InputFieldConfig, KindOptions, TypeConfig};
use crate::Result;

/// A field ready for lowering.
pub(crate) struct LoweredField {
    pub config: FieldConfig,
    pub resolver: Resolver,
    pub subscribe: Option<Subscriber>,
    pub arg_shapes: IndexMap<String, InputShape>,
}

/// A type ready for lowering.
pub(crate) struct LoweredType {
    pub config: TypeConfig,
    pub interfaces: Vec<String>,
    pub members: Vec<String>,
    pub fields: IndexMap<String, LoweredField>,
    pub input_fields: IndexMap<String, InputFieldConfig>,
    pub enum_values: IndexMap<String, EnumValueConfig>,
}

/// Everything lowering needs besides the types themselves.
pub(crate) struct LoweringContext<'a> {
    pub shapes: Arc<InputShapes>,
    pub enums: &'a IndexMap<String, Arc<EnumMapping>>,
    pub resolve_types: &'a IndexMap<String, ResolveTypeFn>,
    pub limits: &'a EngineLimits,
}

#[derive(Clone)]
enum OutputMode {
    Plain,
    Enum(Arc<EnumMapping>),
    Abstract {
        type_name: Arc<str>,
        resolve_type: ResolveTypeFn,
    },
}

/// Converts resolver results into engine values for one field.
#[derive(Clone)]
struct Output {
    list: bool,
    mode: OutputMode,
}

impl Output {
    fn convert<'a>(&self, value: Value, ctx: &RequestContext) -> async_graphql::Result<Option<FieldValue<'a>>> {
        if matches!(value, Value::Null) {
            return Ok(None);
        }
        if !self.list {
            return self.item(value, ctx).map(Some);
        }
        match value {
            Value::List(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.item(item, ctx))
                    .collect::<async_graphql::Result<Vec<_>>>()?;
                Ok(Some(FieldValue::list(items)))
            }
            other => Err(async_graphql::Error::new(format!(
                "Expected a list, got {other}"
            ))),
        }
    }

    fn item<'a>(&self, value: Value, ctx: &RequestContext) -> async_graphql::Result<FieldValue<'a>> {
        if matches!(value, Value::Null) {
            return Ok(FieldValue::NULL);
        }
        match &self.mode {
            OutputMode::Plain => Ok(FieldValue::value(value)),
            OutputMode::Enum(mapping) => match mapping.name_of(&value) {
                Some(name) => Ok(FieldValue::value(Value::Enum(Name::new(name)))),
                None => Err(async_graphql::Error::new(format!(
                    "Enum `{}` cannot represent value: {value}",
                    mapping.type_name()
                ))),
            },
            OutputMode::Abstract {
                type_name,
                resolve_type,
            } => match resolve_type(&value, ctx) {
                Some(concrete) => Ok(FieldValue::value(value).with_type(concrete)),
                None => Err(async_graphql::Error::new(format!(
                    "Unable to resolve type of value for abstract type `{type_name}`"
                ))),
            },
        }
    }
}

/// Per-field state shared by every invocation of the lowered resolver.
struct FieldRuntime {
    resolver: Resolver,
    subscribe: Option<Subscriber>,
    info: Arc<ResolveInfo>,
    output: Output,
    arg_shapes: IndexMap<String, InputShape>,
    shapes: Arc<InputShapes>,
}

impl FieldRuntime {
    fn params(&self, ctx: &ResolverContext<'_>) -> async_graphql::Result<ResolveParams> {
        let context = ctx
            .data::<RequestContext>()
            .map_err(|_| async_graphql::Error::new("Request context not available"))?
            .clone();
        let parent = ctx.parent_value.as_value().cloned().unwrap_or(Value::Null);
        let args = ctx
            .args
            .iter()
            .map(|(name, value)| {
                let value = value.as_value().clone();
                let value = match self.arg_shapes.get(name.as_str()) {
                    Some(shape) => self.shapes.coerce(shape, value),
                    None => value,
                };
                (name.to_string(), value)
            })
            .collect();

        Ok(ResolveParams {
            parent,
            args,
            context,
            info: Arc::clone(&self.info),
        })
    }
}

/// Lowers the prepared types into an executable schema.
pub(crate) fn lower(types: &[LoweredType], cx: &LoweringContext<'_>) -> Result<Schema> {
    let has = |kind: TypeKind| types.iter().any(|t| t.config.kind == kind);
    let mutation = has(TypeKind::Mutation).then_some("Mutation");
    let subscription = has(TypeKind::Subscription).then_some("Subscription");

    let mut builder = Schema::build("Query", mutation, subscription);
    for ty in types {
        trace!(type_name = %ty.config.name, kind = %ty.config.kind, "Lowering type");
        builder = match ty.config.kind {
            TypeKind::Object | TypeKind::Query | TypeKind::Mutation => {
                builder.register(lower_object(ty, cx))
            }
            TypeKind::Subscription => builder.register(lower_subscription(ty, cx)),
            TypeKind::Interface => builder.register(lower_interface(ty, cx)),
            TypeKind::Union => builder.register(lower_union(ty)),
            TypeKind::Enum => builder.register(lower_enum(ty)),
            TypeKind::Scalar => builder.register(lower_scalar(ty)),
            TypeKind::InputObject => builder.register(lower_input_object(ty, cx)),
        };
    }

    if let Some(depth) = cx.limits.max_depth {
        builder = builder.limit_depth(depth);
    }
    if let Some(complexity) = cx.limits.max_complexity {
        builder = builder.limit_complexity(complexity);
    }
    if !cx.limits.introspection {
        builder = builder.disable_introspection();
    }

    let schema = builder
        .finish()
        .map_err(|e| SchemaError::Engine(e.to_string()))?;
    debug!(types = types.len(), "Lowered schema");
    Ok(schema)
}

fn runtime(field: &LoweredField, cx: &LoweringContext<'_>) -> Arc<FieldRuntime> {
    let config = &field.config;
    let (type_name, kind, list, return_type) = match &config.resolved_type {
        Some(resolved) => (
            resolved.name.clone(),
            resolved.kind,
            resolved.list,
            resolved.to_string(),
        ),
        None => (String::new(), TypeKind::Scalar, false, String::new()),
    };

    let mode = if kind.is_abstract() {
        match cx.resolve_types.get(&type_name) {
            Some(resolve_type) => OutputMode::Abstract {
                type_name: Arc::from(type_name.as_str()),
                resolve_type: Arc::clone(resolve_type),
            },
            None => OutputMode::Plain,
        }
    } else if kind == TypeKind::Enum {
        cx.enums
            .get(&type_name)
            .map_or(OutputMode::Plain, |mapping| OutputMode::Enum(Arc::clone(mapping)))
    } else {
        OutputMode::Plain
    };

    Arc::new(FieldRuntime {
        resolver: Arc::clone(&field.resolver),
        subscribe: field.subscribe.clone(),
        info: Arc::new(ResolveInfo {
            parent_type: config.parent_type.clone(),
            field_name: config.name.clone(),
            return_type,
        }),
        output: Output { list, mode },
        arg_shapes: field.arg_shapes.clone(),
        shapes: Arc::clone(&cx.shapes),
    })
}

fn input_value(config: &InputFieldConfig, shape: Option<&InputShape>, shapes: &InputShapes) -> InputValue {
    let type_ref = config
        .resolved_type
        .as_ref()
        .map(|resolved| resolved.to_type_ref())
        .unwrap_or_else(|| async_graphql::dynamic::TypeRef::named(config.name.clone()));
    let mut value = InputValue::new(config.name.clone(), type_ref);
    if let Some(description) = &config.description {
        value = value.description(description.clone());
    }
    if let Some(default) = &config.default_value {
        let default = match shape {
            Some(shape) => shapes.default_literal(shape, default.clone()),
            None => default.clone(),
        };
        value = value.default_value(default);
    }
    value
}

fn lower_object(ty: &LoweredType, cx: &LoweringContext<'_>) -> Object {
    let mut object = Object::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        object = object.description(description.clone());
    }
    for interface in &ty.interfaces {
        object = object.implement(interface.clone());
    }
    for field in ty.fields.values() {
        object = object.field(lower_field(field, cx));
    }
    object
}

fn lower_field(field: &LoweredField, cx: &LoweringContext<'_>) -> Field {
    let config = &field.config;
    let runtime = runtime(field, cx);
    let type_ref = type_ref_of(config);

    let mut lowered = Field::new(config.name.clone(), type_ref, move |ctx| {
        let runtime = Arc::clone(&runtime);
        FieldFuture::new(async move {
            let params = runtime.params(&ctx)?;
            let context = params.context.clone();
            let value = (runtime.resolver)(params).await?;
            runtime.output.convert(value, &context)
        })
    });
    if let Some(description) = &config.description {
        lowered = lowered.description(description.clone());
    }
    if let Some(reason) = &config.deprecation_reason {
        lowered = lowered.deprecation(Some(reason.as_str()));
    }
    for arg in config.args.values() {
        lowered = lowered.argument(input_value(arg, field.arg_shapes.get(&arg.name), &cx.shapes));
    }
    lowered
}

fn lower_subscription(ty: &LoweredType, cx: &LoweringContext<'_>) -> Subscription {
    let mut subscription = Subscription::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        subscription = subscription.description(description.clone());
    }
    for field in ty.fields.values() {
        subscription = subscription.field(lower_subscription_field(field, cx));
    }
    subscription
}

fn lower_subscription_field(field: &LoweredField, cx: &LoweringContext<'_>) -> SubscriptionField {
    let config = &field.config;
    let runtime = runtime(field, cx);
    let type_ref = type_ref_of(config);

    let mut lowered = SubscriptionField::new(config.name.clone(), type_ref, move |ctx| {
        let runtime = Arc::clone(&runtime);
        let params = runtime.params(&ctx);
        SubscriptionFieldFuture::new(async move {
            let params = params?;
            let subscribe = runtime.subscribe.clone().ok_or_else(|| {
                async_graphql::Error::new(format!(
                    "Subscription field `{}` has no event source",
                    runtime.info.coordinate()
                ))
            })?;
            let events = subscribe(params.clone()).await?;
            Ok(events.then(move |event| {
                let runtime = Arc::clone(&runtime);
                let params = params.clone();
                async move {
                    let parent = event?;
                    let context = params.context.clone();
                    let value = (runtime.resolver)(ResolveParams { parent, ..params }).await?;
                    Ok::<_, async_graphql::Error>(
                        runtime.output.convert(value, &context)?.unwrap_or(FieldValue::NULL),
                    )
                }
            }))
        })
    });
    if let Some(description) = &config.description {
        lowered = lowered.description(description.clone());
    }
    if let Some(reason) = &config.deprecation_reason {
        lowered = lowered.deprecation(Some(reason.as_str()));
    }
    for arg in config.args.values() {
        lowered = lowered.argument(input_value(arg, field.arg_shapes.get(&arg.name), &cx.shapes));
    }
    lowered
}

fn lower_interface(ty: &LoweredType, cx: &LoweringContext<'_>) -> Interface {
    let mut interface = Interface::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        interface = interface.description(description.clone());
    }
    for parent in &ty.interfaces {
        interface = interface.implement(parent.clone());
    }
    for field in ty.fields.values() {
        let config = &field.config;
        let mut lowered = InterfaceField::new(config.name.clone(), type_ref_of(config));
        if let Some(description) = &config.description {
            lowered = lowered.description(description.clone());
        }
        if let Some(reason) = &config.deprecation_reason {
            lowered = lowered.deprecation(Some(reason.as_str()));
        }
        for arg in config.args.values() {
            lowered = lowered.argument(input_value(arg, field.arg_shapes.get(&arg.name), &cx.shapes));
        }
        interface = interface.field(lowered);
    }
    interface
}

fn lower_union(ty: &LoweredType) -> Union {
    let mut union = Union::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        union = union.description(description.clone());
    }
    for member in &ty.members {
        union = union.possible_type(member.clone());
    }
    union
}

fn lower_enum(ty: &LoweredType) -> Enum {
    let mut lowered = Enum::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        lowered = lowered.description(description.clone());
    }
    for value in ty.enum_values.values() {
        let mut item = EnumItem::new(value.name.clone());
        if let Some(description) = &value.description {
            item = item.description(description.clone());
        }
        if let Some(reason) = &value.deprecation_reason {
            item = item.deprecation(Some(reason.as_str()));
        }
        lowered = lowered.item(item);
    }
    lowered
}

fn lower_scalar(ty: &LoweredType) -> Scalar {
    let mut scalar = Scalar::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        scalar = scalar.description(description.clone());
    }
    if let KindOptions::Scalar {
        specified_by_url,
        validator,
        ..
    } = &ty.config.options
    {
        if let Some(url) = specified_by_url {
            scalar = scalar.specified_by_url(url.clone());
        }
        if let Some(validator) = validator {
            let validator = Arc::clone(validator);
            scalar = scalar.validator(move |value| validator(value));
        }
    }
    scalar
}

fn lower_input_object(ty: &LoweredType, cx: &LoweringContext<'_>) -> InputObject {
    let mut object = InputObject::new(ty.config.name.clone());
    if let Some(description) = &ty.config.description {
        object = object.description(description.clone());
    }
    let fields = match cx.shapes.get(&ty.config.name) {
        Some(InputShape::Object { fields, .. }) => Some(fields),
        _ => None,
    };
    for field in ty.input_fields.values() {
        let shape = fields.and_then(|fields| fields.get(&field.name));
        object = object.field(input_value(field, shape, &cx.shapes));
    }
    object
}

fn type_ref_of(config: &FieldConfig) -> async_graphql::dynamic::TypeRef {
    config
        .resolved_type
        .as_ref()
        .map(|resolved| resolved.to_type_ref())
        .unwrap_or_else(|| async_graphql::dynamic::TypeRef::named(config.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> Arc<EnumMapping> {
        Arc::new(EnumMapping::new(
            "Episode",
            vec![
                ("NEWHOPE".to_string(), Value::from(4)),
                ("EMPIRE".to_string(), Value::from(5)),
            ],
        ))
    }

    #[test]
    fn test_enum_output_maps_internal_value() {
        let output = Output {
            list: true,
            mode: OutputMode::Enum(mapping()),
        };
        let ctx = RequestContext::new();
        let converted = output
            .convert(Value::List(vec![Value::from(5), Value::Null]), &ctx)
            .unwrap();
        assert!(converted.is_some());

        let single = Output {
            list: false,
            mode: OutputMode::Enum(mapping()),
        };
        assert!(single.convert(Value::from(9), &ctx).is_err());
    }

    #[test]
    fn test_abstract_output_requires_discriminator_match() {
        let output = Output {
            list: false,
            mode: OutputMode::Abstract {
                type_name: Arc::from("Character"),
                resolve_type: Arc::new(|_, _| None),
            },
        };
        let err = output
            .convert(Value::String("x".into()), &RequestContext::new())
            .err()
            .unwrap();
        assert!(err.message.contains("Unable to resolve type"));
        assert!(err.message.contains("Character"));
    }

    #[test]
    fn test_null_and_list_mismatch() {
        let output = Output {
            list: true,
            mode: OutputMode::Plain,
        };
        let ctx = RequestContext::new();
        assert!(output.convert(Value::Null, &ctx).unwrap().is_none());
        assert!(output.convert(Value::from(1), &ctx).is_err());
    }
}
