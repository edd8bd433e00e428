#![allow(clippy::result_large_err)]

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;

use crate::asserter::AssertResult;
use crate::asserter::Asserter;
use crate::cli::Cli;
use crate::cli::Command;
use crate::outputter::OutPutter;
use crate::parser::RawSuite;
use crate::runner::RunnerResult;
use crate::runner::run_generated_tests;
use crate::validator::SmokeConfig;
use crate::validator::ValidationError;
use crate::validator::Validator;

mod asserter;
mod cli;
mod differ;
mod generator;
mod outputter;
mod parser;
mod runner;
mod schema;
mod validator;

#[derive(Error, Debug, Diagnostic)]
pub enum SmokeError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Failed to read config file")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse yaml file")]
    YamlParsing(#[from] serde_yaml::Error),

    #[error("Empty config file")]
    EmptyConfig,

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Failed to serialize test plan")]
    PlanSerialize(#[from] serde_json::Error),

    #[error("File already exists: {0}")]
    #[diagnostic(help("use --force to overwrite"))]
    AlreadyExists(String),
}

/// Prints only when --verbose is set.
fn log_verbose(verbose: bool, msg: &str) {
    if verbose {
        println!("{}", console::style(msg).dim());
    }
}

const SAMPLE_CONFIG: &str = r#"base_url: https://api.example.com
tests:
  - name: Get Users
    path: /users
    method: GET
    expect_status: 200
    expect_body_schema:
      id: "int"
      name: "str"

  - name: Get Single User
    path: /users/1
    method: GET
    expect_status: 200
    expect_body_schema:
      id: "int"
      name: "str"
      email: "str"
"#;

fn load_config(path: &str) -> Result<SmokeConfig, SmokeError> {
    if !Path::new(path).exists() {
        return Err(SmokeError::ConfigNotFound(path.into()));
    }

    let contents = std::fs::read_to_string(path).map_err(SmokeError::FileError)?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(SmokeError::YamlParsing)?;
    if document.is_null() {
        return Err(SmokeError::EmptyConfig);
    }

    let raw: RawSuite = serde_yaml::from_value(document).map_err(SmokeError::YamlParsing)?;

    let config = Validator::new(&raw, &contents, path).validate()?;

    Ok(config)
}

fn init(path: &str, force: bool) -> Result<(), SmokeError> {
    if Path::new(path).exists() && !force {
        return Err(SmokeError::AlreadyExists(path.into()));
    }

    std::fs::write(path, SAMPLE_CONFIG).map_err(SmokeError::FileError)?;
    println!("{} {path}", console::style("Created:").green());

    Ok(())
}

fn generate_plan(
    config_path: &str,
    output: &str,
    dry_run: bool,
    verbose: bool,
) -> Result<(), SmokeError> {
    log_verbose(verbose, &format!("Loading config from: {config_path}"));
    let config = load_config(config_path)?;
    log_verbose(verbose, &format!("Found {} tests", config.tests.len()));
    log_verbose(verbose, &format!("Base URL: {}", config.base_url));

    let tests = generator::generate(&config);
    let plan = generator::render_plan(&tests)?;

    if dry_run {
        println!("{}", console::style("Dry run - generated plan:").yellow());
        println!();
        println!("{plan}");
        return Ok(());
    }

    std::fs::write(output, plan).map_err(SmokeError::FileError)?;
    println!("{} {output}", console::style("Generated:").green());
    println!("{}", console::style(format!("Tests: {}", tests.len())).dim());

    Ok(())
}

async fn run(config_path: &str, verbose: bool) -> Result<usize, SmokeError> {
    log_verbose(verbose, &format!("Loading config from: {config_path}"));
    let config = load_config(config_path)?;
    log_verbose(verbose, &format!("Found {} tests", config.tests.len()));

    let tests = generator::generate(&config);
    let n_tests = tests.len();

    let (runner_tx, asserter_rx) = flume::unbounded::<RunnerResult>();
    let (asserter_tx, outputter_rx) = flume::unbounded::<(String, Arc<[AssertResult]>)>();

    let path = config_path.to_string();
    let outputter_jh =
        tokio::spawn(async move { OutPutter::start(outputter_rx, &path, n_tests).await });

    let runner_jh = tokio::spawn(async move { run_generated_tests(tests, runner_tx).await });

    let asserter_jh = tokio::spawn(async move { Asserter::run(asserter_rx, asserter_tx).await });

    let (_, _, n_failed) = futures::join!(runner_jh, asserter_jh, outputter_jh);

    Ok(n_failed.unwrap_or(n_tests))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init { path, force } => init(&path, force)?,
        Command::Generate {
            config,
            output,
            dry_run,
        } => generate_plan(&config, &output, dry_run, cli.verbose)?,
        Command::Run { config } => {
            let n_failed = run(&config, cli.verbose).await?;
            if n_failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
