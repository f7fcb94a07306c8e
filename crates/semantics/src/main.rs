//! Ember Semantic Analysis CLI
//!
//! A development/smoke-test harness for the semantic core: reads a
//! JSON-encoded parse tree (the input contract, spec §6) and runs it
//! through the pipeline, printing diagnostics in source order. Parsing real
//! Ember source is out of scope (spec §1) — this binary exists to exercise
//! the pipeline end to end without a real front end.

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use embersem::ast::ParseProgram;
use embersem::{PipelineConfig, analyze_program};

#[derive(ClapParser)]
#[command(name = "emberc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ember semantic analysis harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run semantic analysis over a JSON-encoded parse tree
    Check {
        /// Input JSON parse tree
        input: PathBuf,

        /// Original source text, used to translate byte offsets into
        /// line/column positions for diagnostics. Defaults to empty (every
        /// diagnostic reports position 1:1).
        #[arg(long)]
        source: Option<PathBuf>,

        /// TOML file with pipeline strictness settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { input, source, config } => run_check(&input, source.as_deref(), config.as_deref()),
    }
}

fn run_check(input: &std::path::Path, source_path: Option<&std::path::Path>, config_path: Option<&std::path::Path>) {
    let json = match fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    let program: ParseProgram = match serde_json::from_str(&json) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error parsing parse tree {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    let source = match source_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading source {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => String::new(),
    };

    let config = match config_path {
        Some(path) => {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error reading config {}: {}", path.display(), e);
                    process::exit(1);
                }
            };
            match PipelineConfig::load_toml(&content) {
                Ok(strictness) => PipelineConfig::new().with_strictness(strictness),
                Err(e) => {
                    eprintln!("Error parsing config: {e}");
                    process::exit(1);
                }
            }
        }
        None => PipelineConfig::new(),
    };

    let file_name = input.display().to_string();
    let outcome = analyze_program(file_name, &source, &program, &config);

    let diagnostics = outcome.diagnostics();
    if diagnostics.is_empty() {
        println!(
            "No diagnostics; {} function(s) fully resolved",
            outcome.functions.len()
        );
        return;
    }

    for diagnostic in diagnostics.iter() {
        println!("{diagnostic}");
    }
    println!("{} diagnostic(s)", diagnostics.len());

    if diagnostics.has_errors() {
        process::exit(1);
    }
}
