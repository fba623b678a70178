use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use trellis_core::BuiltSchema;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => print_as_table(value)?,
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// One row per top-level entry of `data`, errors listed after.
fn print_as_table(value: &Value) -> anyhow::Result<()> {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    if let Some(data) = value.get("data").and_then(Value::as_object) {
        for (field, result) in data {
            builder.push_record([field.clone(), serde_json::to_string(result)?]);
        }
    }
    println!("{}", builder.build().with(Style::rounded()));

    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        for error in errors {
            let message = error.get("message").and_then(Value::as_str).unwrap_or("-");
            print_error(message);
        }
    }
    Ok(())
}

/// Type listing: name, kind and field names.
pub fn type_rows(schema: &BuiltSchema) -> Vec<[String; 3]> {
    schema
        .type_names()
        .filter_map(|name| schema.type_config(name))
        .map(|config| {
            let fields: Vec<&str> = schema.fields(&config.name).map(|f| f.name.as_str()).collect();
            [config.name.clone(), config.kind.to_string(), fields.join(", ")]
        })
        .collect()
}

pub fn print_types(schema: &BuiltSchema, format: OutputFormat) -> anyhow::Result<()> {
    let rows = type_rows(schema);
    match format {
        OutputFormat::Json => {
            let value: Vec<Value> = rows
                .into_iter()
                .map(|[name, kind, fields]| serde_json::json!({ "name": name, "kind": kind, "fields": fields }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Type", "Kind", "Fields"]);
            for row in rows {
                builder.push_record(row);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
    Ok(())
}
