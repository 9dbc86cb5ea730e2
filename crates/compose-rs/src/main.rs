//! Compose prompt payloads, render templates and check section configs.
//!
//! # Examples
//!
//! ```sh
//! # Compose from one JSON object of fragments (keys are fragment names)
//! compose run fragments.json
//!
//! # Compose from a directory of <fragment>.json files, printed as markdown
//! compose run ./fragments --sections sections.json --format markdown
//!
//! # Render a template against sample data, reporting authoring mistakes
//! compose render --file greeting.tmpl --data sample.json --strict
//!
//! # Pre-flight check a section list
//! compose validate --sections sections.json
//!
//! # JSON Schema for section files
//! compose schema > sections.schema.json
//! ```

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use compose_rs::compose::config::{load_sections, section_schema};
use compose_rs::prelude::*;
use compose_rs::template;
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Compose prompt payloads from loaded data fragments.
#[derive(Parser)]
#[command(name = "compose", version)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a document from fragments.
    Run {
        /// A JSON object of fragments, or a directory of `<name>.json` files.
        fragments: PathBuf,

        /// Composer config file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Section list file; overrides any sections in --config.
        #[arg(long)]
        sections: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Per-fragment load timeout in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        fragment_timeout_ms: u64,
    },

    /// Render a template against JSON data.
    Render {
        /// Template text.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        template: Option<String>,

        /// Read the template from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// JSON data file; defaults to an empty object.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Report unmatched blocks, malformed tags and unknown paths instead
        /// of rendering leniently.
        #[arg(long)]
        strict: bool,
    },

    /// Check a section list for configuration errors.
    Validate {
        /// Section list file; the built-in reference list when omitted.
        #[arg(long)]
        sections: Option<PathBuf>,
    },

    /// Print the JSON Schema for section list files.
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli.command).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn execute(command: Command) -> Result<String, String> {
    match command {
        Command::Run {
            fragments,
            config,
            sections,
            format,
            fragment_timeout_ms,
        } => {
            let mut config = match config {
                Some(path) => ComposerConfig::from_file(&path).map_err(|e| e.to_string())?,
                None => ComposerConfig::default(),
            };
            if let Some(path) = sections {
                config = config.with_sections(load_sections(&path).map_err(|e| e.to_string())?);
            }

            let loader = FragmentLoader::new(config.subject_key.clone())
                .fragment_timeout(std::time::Duration::from_millis(fragment_timeout_ms));
            let loaded = register_fragments(loader, &fragments)?.load().await;

            let composer = Composer::new(config).map_err(|e| e.to_string())?;
            let result = composer.compose(&loaded).map_err(|e| e.to_string())?;
            match format {
                Format::Json => to_pretty(&result.to_json()),
                Format::Markdown => Ok(result.render_prompt()),
            }
        }

        Command::Render {
            template,
            file,
            data,
            strict,
        } => {
            let text = match (template, file) {
                (Some(text), _) => text,
                (None, Some(path)) => read(&path)?,
                (None, None) => return Err("provide --template or --file".to_string()),
            };
            let data = match data {
                Some(path) => parse_json(&path)?,
                None => json!({}),
            };
            if strict {
                let issues = template::validate_with_data(&text, &data);
                if !issues.is_empty() {
                    let lines: Vec<String> = issues.iter().map(|i| format!("  - {i}")).collect();
                    return Err(format!(
                        "template has {} issue(s):\n{}",
                        issues.len(),
                        lines.join("\n")
                    ));
                }
            }
            Ok(compile(&text, &data))
        }

        Command::Validate { sections } => {
            let sections = match sections {
                Some(path) => load_sections(&path).map_err(|e| e.to_string())?,
                None => default_sections(),
            };
            let report = validate_sections(&sections, &TransformRegistry::builtin());
            if report.is_valid() {
                Ok(format!("{} section(s) OK\n{report}", sections.len()))
            } else {
                Err(format!("invalid section configuration:\n{report}"))
            }
        }

        Command::Schema => to_pretty(&section_schema()),
    }
}

/// Register every fragment under `path` with the loader. Directory entries
/// are read concurrently by the loader itself.
fn register_fragments(mut loader: FragmentLoader, path: &Path) -> Result<FragmentLoader, String> {
    if path.is_dir() {
        let entries = std::fs::read_dir(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        for entry in entries.flatten() {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            debug!("[cli] fragment '{name}' from {}", file.display());
            loader = loader.fragment(name, async move {
                let text = tokio::fs::read_to_string(&file)
                    .await
                    .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("invalid JSON in {}: {e}", file.display()))
            });
        }
        return Ok(loader);
    }

    match parse_json(path)? {
        Value::Object(fragments) => {
            for (name, value) in fragments {
                loader = loader.value(name, value);
            }
            Ok(loader)
        }
        _ => Err(format!("{} must contain a JSON object of fragments", path.display())),
    }
}

fn read(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn parse_json(path: &Path) -> Result<Value, String> {
    serde_json::from_str(&read(path)?)
        .map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn to_pretty(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
