//! Codegrade CLI
//!
//! Runs the analyzers and the test runner over files on disk.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use codegrade::hints::HintGenerator;
use codegrade::test_runner::TestRunner;
use codegrade::{
    analyze_script, audit_accessibility, validate_markup, validate_style, GraderConfig, Report,
    TestRunResult, VERSION,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codegrade")]
#[command(author, version, about = "Grade HTML, CSS and JavaScript exercises", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a JavaScript file
    Script {
        /// The file to analyze
        file: PathBuf,
    },

    /// Validate an HTML file
    Markup {
        /// The file to validate
        file: PathBuf,
    },

    /// Validate a CSS file
    Style {
        /// The file to validate
        file: PathBuf,
    },

    /// Audit an HTML file for accessibility
    A11y {
        /// The file to audit
        file: PathBuf,
    },

    /// Run the tests declared in a JavaScript file
    Test {
        /// Test file
        file: PathBuf,
        /// Show hints and quick fixes for failures, up to this level (1-3)
        #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(1..=3))]
        hints: Option<u8>,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(success) => {
            if !success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn setup_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GraderConfig> {
    match path {
        Some(path) => GraderConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(GraderConfig::default()),
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Returns whether the command succeeded: analyzer reports without errors,
/// or a test run where every case passed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(cli.config.as_deref())?;
    debug!(version = VERSION, "codegrade started");

    match cli.command {
        Commands::Script { file } => report(&analyze_script(&read_source(&file)?), cli.json),
        Commands::Markup { file } => report(&validate_markup(&read_source(&file)?), cli.json),
        Commands::Style { file } => report(&validate_style(&read_source(&file)?), cli.json),
        Commands::A11y { file } => {
            let audit = audit_accessibility(&read_source(&file)?);
            if cli.json {
                print_json(&audit)?;
            } else {
                print!("{}", audit);
                println!();
            }
            Ok(audit.summary.errors == 0)
        }
        Commands::Test { file, hints } => {
            let source = read_source(&file)?;
            let result = TestRunner::with_config(&config.runner).run(&source);
            if let Some(level) = hints {
                if level > config.hints.max_level {
                    bail!(
                        "hint level {} exceeds the configured maximum of {}",
                        level,
                        config.hints.max_level
                    );
                }
            }
            if cli.json {
                print_test_json(&result, hints, &config)?;
            } else {
                print!("{}", result);
                if let Some(level) = hints {
                    print_hints(&result, level, &config);
                }
            }
            Ok(result.passed)
        }
    }
}

fn report(report: &Report, json: bool) -> anyhow::Result<bool> {
    if json {
        print_json(report)?;
    } else {
        println!("{}", report);
    }
    Ok(report.summary.errors == 0)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_hints(result: &TestRunResult, level: u8, config: &GraderConfig) {
    let generator = HintGenerator::new(&config.hints);
    for failure in result.failures() {
        println!("\nHints for {}:", failure.name);
        for hint in generator.progressive_hints(failure, level) {
            println!("  - {}", hint);
        }
        if let Some(fix) = generator.quick_fix(failure) {
            println!("  Quick fix: {} → {}", fix.issue, fix.fix);
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureHints {
    name: String,
    hints: Vec<codegrade::Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quick_fix: Option<codegrade::QuickFix>,
}

#[derive(Serialize)]
struct TestOutput<'a> {
    #[serde(flatten)]
    result: &'a TestRunResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hints: Vec<FailureHints>,
}

fn print_test_json(
    result: &TestRunResult,
    level: Option<u8>,
    config: &GraderConfig,
) -> anyhow::Result<()> {
    let hints = match level {
        Some(level) => {
            let generator = HintGenerator::new(&config.hints);
            result
                .failures()
                .map(|failure| FailureHints {
                    name: failure.name.clone(),
                    hints: generator.progressive_hints(failure, level),
                    quick_fix: generator.quick_fix(failure),
                })
                .collect()
        }
        None => Vec::new(),
    };
    print_json(&TestOutput { result, hints })
}
