use clap::{Parser, Subcommand, ValueEnum};
use openehr_rules::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rules-cli")]
#[command(about = "Evaluate openEHR archetype rules against object trees")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the archetype's rules against an instance
    Evaluate {
        /// Archetype JSON with definition, terminology and rules
        #[arg(short, long)]
        archetype: PathBuf,
        /// Instance tree in canonical JSON
        #[arg(short, long)]
        instance: PathBuf,
        /// Evaluation config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Where to write the instance after write-back
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print every match of a path in an instance
    Resolve {
        #[arg(short, long)]
        instance: PathBuf,
        #[arg(short, long)]
        path: String,
    },
    /// Check an archetype's rules without evaluating them
    ValidateRules {
        #[arg(short, long)]
        archetype: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Evaluate {
            archetype,
            instance,
            config,
            format,
            output,
        } => evaluate(&archetype, &instance, config.as_deref(), format, output.as_deref()),
        Commands::Resolve { instance, path } => resolve(&instance, &path),
        Commands::ValidateRules { archetype } => validate_rules(&archetype),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("❌ {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_instance(path: &Path, model: &ModelRegistry) -> CliResult<RmTree> {
    let content = std::fs::read_to_string(path)?;
    Ok(RmTree::from_json_str(&content, model)?)
}

fn evaluate(
    archetype_path: &Path,
    instance_path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    output_path: Option<&Path>,
) -> CliResult<bool> {
    let archetype = Archetype::from_file(archetype_path)?;
    let model = ModelRegistry::openehr();
    let config = match config_path {
        Some(path) => EvaluationConfig::from_file(path)?,
        None => EvaluationConfig::default(),
    };
    let mut tree = load_instance(instance_path, &model)?;

    let result = RuleEvaluation::new(&archetype, &model)
        .with_config(config)
        .evaluate(&mut tree)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_result(&result),
    }

    if let Some(output_path) = output_path {
        std::fs::write(output_path, serde_json::to_string_pretty(&tree.to_json())?)?;
        println!("📝 Wrote instance to {}", output_path.display());
    }

    Ok(result.all_assertions_passed() && !result.has_errors())
}

fn print_result(result: &EvaluationResult) {
    for assertion in &result.assertion_results {
        let name = assertion
            .tag
            .clone()
            .unwrap_or_else(|| format!("assertion {}", assertion.statement_index + 1));
        if assertion.result {
            println!("✅ {name}");
        } else {
            println!("❌ {name}");
            for path in &assertion.paths {
                println!("    at: {path}");
            }
        }
    }
    if !result.paths_that_must_exist.is_empty() {
        println!("\nPaths that must exist:");
        for path in &result.paths_that_must_exist {
            println!("  {path}");
        }
    }
    if !result.paths_that_must_not_exist.is_empty() {
        println!("\nPaths that must not exist:");
        for path in &result.paths_that_must_not_exist {
            println!("  {path}");
        }
    }
    if !result.set_path_values.is_empty() {
        println!("\nValues set:");
        for (path, value) in &result.set_path_values {
            println!("  {path} = {value}");
        }
    }
    for diagnostic in &result.diagnostics {
        println!("{} {diagnostic}", match diagnostic.severity {
            DiagnosticSeverity::Error => "ERROR",
            DiagnosticSeverity::Warning => "WARN",
        });
    }
}

fn resolve(instance_path: &Path, path: &str) -> CliResult<bool> {
    let model = ModelRegistry::openehr();
    let tree = load_instance(instance_path, &model)?;
    let matches = tree.resolve(path)?;
    if matches.is_empty() {
        println!("No match for {path}");
        return Ok(false);
    }
    for found in matches {
        match tree.primitive(found.node) {
            Some(value) => println!("{} = {value}", found.path),
            None => println!(
                "{} ({})",
                found.path,
                tree.type_name(found.node).unwrap_or("?")
            ),
        }
    }
    Ok(true)
}

fn validate_rules(archetype_path: &Path) -> CliResult<bool> {
    match Archetype::from_file(archetype_path) {
        Ok(archetype) => {
            println!(
                "✅ {} rules of {} are well-formed",
                archetype.rules.len(),
                archetype.archetype_id
            );
            Ok(true)
        }
        Err(RulesError::MalformedRule { message, statement }) => {
            println!("❌ Rule validation failed: {message}");
            if let Some(statement) = statement {
                println!("    in: {statement}");
            }
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}
