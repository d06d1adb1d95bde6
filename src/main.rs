use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cypherql::config::{CliConfig, TranslatorConfig};
use cypherql::{translate, AuthPredicates, SchemaModel, SelectionTree};

/// cypherql - compile a graph selection request into parameterized Cypher
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema definition (YAML); overrides the configured schema path
    #[arg(long)]
    schema: Option<String>,

    /// Selection request (JSON)
    #[arg(long)]
    request: PathBuf,

    /// Authorization rules (JSON)
    #[arg(long)]
    auth: Option<PathBuf>,

    /// Translator configuration file (YAML), applied over the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Page size for top-level lists without a declared default
    #[arg(long)]
    default_limit: Option<u64>,

    /// Ceiling for every page size
    #[arg(long)]
    max_limit: Option<u64>,

    /// Emit cursors without a filter/sort signature
    #[arg(long)]
    unsigned_cursors: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            schema_path: cli.schema.clone(),
            default_limit: cli.default_limit,
            max_limit: cli.max_limit,
            unsigned_cursors: cli.unsigned_cursors,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<TranslatorConfig> {
    let mut config = TranslatorConfig::from_env().context("reading environment configuration")?;
    if let Some(path) = &cli.config {
        let file = TranslatorConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?;
        config.merge(file);
    }
    Ok(config.apply_cli(cli.into())?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = load_config(cli)?;
    log::info!("loading schema from {}", config.schema_path);
    let schema = SchemaModel::from_yaml_file(&config.schema_path)?;

    let selection: SelectionTree = read_json(&cli.request)?;
    let auth: AuthPredicates = match &cli.auth {
        Some(path) => read_json(path)?,
        None => AuthPredicates::default(),
    };

    let compiled = translate(&schema, &selection, &auth, &config.settings())?;
    let output = if cli.pretty {
        serde_json::to_string_pretty(&compiled)?
    } else {
        serde_json::to_string(&compiled)?
    };
    Ok(output)
}

fn main() {
    // Defaults to INFO, overridable with RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
