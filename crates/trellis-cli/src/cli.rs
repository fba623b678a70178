use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Build, print and query the bundled Star Wars schema")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Builder configuration file (TOML)
    #[arg(short, long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the schema in SDL
    Schema(SchemaArgs),
    /// Execute a query against the schema
    Query(QueryArgs),
    /// List the types of the schema
    Types,
    /// Show the effective builder configuration
    Config,
}

#[derive(clap::Args)]
pub struct SchemaArgs {
    /// Write the SDL to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Query document (reads --file or stdin if omitted)
    pub query: Option<String>,
    /// Path to a file holding the query document
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Variables as a JSON object
    #[arg(long)]
    pub variables: Option<String>,
    /// Operation to run when the document holds several
    #[arg(long)]
    pub operation: Option<String>,
    /// Auth scope granted to the request (repeatable)
    #[arg(long = "scope")]
    pub scopes: Vec<String>,
}
