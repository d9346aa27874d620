use clap::{Parser, Subcommand, ValueEnum};
use docmodel::{parse_schema, Fields, Schema, SchemaRegistry, Value};
use std::path::{Path, PathBuf};
use std::process;

/// docmodel CLI: check documents against declarative schemas
#[derive(Parser)]
#[command(name = "docmodel", version, about)]
struct Cli {
    /// Path to the schema file
    #[arg(long, default_value = "schema.yaml")]
    schema_file: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List schemas with their fields and types
    Schemas,

    /// Check a document against a schema
    Check {
        /// Schema name
        schema: String,
        /// Document file (.json, otherwise read as YAML)
        document: PathBuf,
        /// Check the document as an update payload
        #[arg(long)]
        update: bool,
        /// Fill absent fields with their defaults before checking
        #[arg(long)]
        apply_defaults: bool,
    },

    /// Show the default value of every field that has one
    Defaults {
        /// Schema name
        schema: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("ERROR:{e}");
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when a checked document is invalid.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let registry = parse_schema(&cli.schema_file)?;
    log::debug!(
        "Loaded {} schemas from {}",
        registry.len(),
        cli.schema_file.display()
    );

    match cli.command {
        Command::Schemas => {
            let listing: serde_json::Map<String, serde_json::Value> = registry
                .iter()
                .map(|schema| {
                    let fields: serde_json::Map<String, serde_json::Value> = schema
                        .fields()
                        .iter()
                        .map(|(name, field_type)| (name.clone(), field_type.type_name().into()))
                        .collect();
                    (schema.name().to_string(), fields.into())
                })
                .collect();
            print_output(&listing.into(), &cli.format)?;
        }

        Command::Check {
            schema,
            document,
            update,
            apply_defaults,
        } => {
            let schema = lookup(&registry, &schema)?;
            let mut data = read_document(&document)?;
            if apply_defaults {
                schema.apply_defaults(&mut data);
            }
            let report = schema.explain(&data, update);
            let valid = report.is_ok();
            print_output(
                &serde_json::json!({
                    "schema": schema.name(),
                    "document": document.display().to_string(),
                    "valid": valid,
                    "errors": report.errors,
                }),
                &cli.format,
            )?;
            return Ok(valid);
        }

        Command::Defaults { schema } => {
            let schema = lookup(&registry, &schema)?;
            let defaults: serde_json::Map<String, serde_json::Value> = schema
                .fields()
                .iter()
                .filter_map(|(name, field_type)| {
                    field_type
                        .options()
                        .default
                        .map(|value| (name.clone(), value.to_json()))
                })
                .collect();
            print_output(&defaults.into(), &cli.format)?;
        }
    }

    Ok(true)
}

fn lookup<'a>(registry: &'a SchemaRegistry, name: &str) -> Result<&'a Schema, String> {
    registry.get(name).ok_or_else(|| {
        let known: Vec<&str> = registry.names().collect();
        format!("Unknown schema '{name}' (known: {})", known.join(", "))
    })
}

fn read_document(path: &Path) -> Result<Fields, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read document '{}': {e}", path.display()))?;
    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    match value {
        Value::Map(fields) => Ok(fields),
        _ => Err(format!("Document '{}' must be a mapping", path.display()).into()),
    }
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
