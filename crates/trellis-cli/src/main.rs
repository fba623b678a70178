mod cli;
mod config;
mod demo;
mod output;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use async_graphql::{Request, Variables};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use trellis_core::{BuiltSchema, RequestContext};
use trellis_plugins::GrantedScopes;

use cli::{Cli, Commands, QueryArgs};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Prefers RUST_LOG, falling back to `level`. Logs go to stderr so command
/// output stays pipeable.
fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn build_schema(config: Option<&Path>) -> Result<BuiltSchema> {
    let options = config::load(config)?;
    let schema = demo::builder(options)?
        .build()
        .context("Failed to build the demo schema")?;
    Ok(schema)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Schema(args) => {
            let sdl = build_schema(cli.config.as_deref())?.sdl();
            match &args.output {
                Some(path) => {
                    std::fs::write(path, sdl)
                        .with_context(|| format!("Cannot write {}", path.display()))?;
                    output::print_success(&format!("Wrote schema to {}", path.display()));
                }
                None => println!("{sdl}"),
            }
        }
        Commands::Query(args) => {
            let schema = build_schema(cli.config.as_deref())?;
            query(&schema, args, format).await?;
        }
        Commands::Types => {
            let schema = build_schema(cli.config.as_deref())?;
            output::print_types(&schema, format)?;
        }
        Commands::Config => {
            let options = config::load(cli.config.as_deref())?;
            println!("{}", "# effective builder configuration".dimmed());
            println!("{}", toml::to_string_pretty(&options)?);
        }
    }

    Ok(())
}

fn read_document(args: &QueryArgs) -> Result<String> {
    if let Some(query) = &args.query {
        return Ok(query.clone());
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read query file {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Cannot read query from stdin")?;
    Ok(buf)
}

async fn query(schema: &BuiltSchema, args: &QueryArgs, format: cli::OutputFormat) -> Result<()> {
    let mut request = Request::new(read_document(args)?);
    if let Some(variables) = &args.variables {
        let json: serde_json::Value =
            serde_json::from_str(variables).context("Variables must be a JSON object")?;
        request = request.variables(Variables::from_json(json));
    }
    if let Some(operation) = &args.operation {
        request = request.operation_name(operation.clone());
    }

    let ctx = RequestContext::new().with(GrantedScopes::new(args.scopes.iter().cloned()));
    let response = schema.execute(request, ctx).await;
    let error_count = response.errors.len();

    output::print_value(&serde_json::to_value(&response)?, format)?;
    if error_count > 0 {
        anyhow::bail!("Query returned {error_count} error(s)");
    }
    Ok(())
}
