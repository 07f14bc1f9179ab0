//! Flowdeploy CLI entrypoint.
//!
//! This is the main entrypoint for the flowdeploy command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use flowdeploy::cli::{Cli, Commands, OutputFormatter};
use flowdeploy::config::{
    ConfigParser, ConfigValidator, DeployConfig, EntrypointSource, ValidationResult,
    find_config_file,
};
use flowdeploy::error::Result;
use flowdeploy::prefect::{ApiSettings, PrefectClient};
use flowdeploy::reconciler::{DeployOutcome, Reconciler};
use flowdeploy::repo::{RepoContext, WorkingTree};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command_or_default() {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Deploy => cmd_deploy(&cli, &formatter).await,
        Commands::Diff => cmd_diff(&cli, &formatter).await,
    }
}

/// Validate the deploy file.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_dir, result) = load_config(config_path)?;

    let source = EntrypointSource::from_config(&config)?;
    let entrypoint = match source {
        EntrypointSource::Explicit(ref entrypoint) => entrypoint.clone(),
        EntrypointSource::Derived { .. } => {
            let repo = RepoContext::discover(&config_dir)?;
            source.resolve(&repo.root(), &config_dir)?
        }
    };

    emit(&formatter.format_validation(&config, &result, &entrypoint, show_warnings))
}

/// Push every deployment and show the changes.
async fn cmd_deploy(cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    let (config, config_dir, _) = load_config(cli.config.as_ref())?;
    let repo = RepoContext::discover(&config_dir)?;
    let client = create_prefect_client()?;

    let options = cli.merge_options();
    info!("Pushing local values for: {:?}", options.fields());

    let outcome = Reconciler::new(&config, &config_dir, &client, &repo)
        .with_options(options)
        .deploy()
        .await?;

    emit(&formatter.format_outcome(&outcome))?;

    if let DeployOutcome::Deployed { results } = &outcome {
        let missing = results.iter().filter(|r| r.report.is_none()).count();
        if missing > 0 {
            eprintln!(
                "{}",
                formatter.warning(&format!(
                    "{missing} deployment(s) could not be read back; check that uncommitted code was not pushed"
                ))
            );
        } else {
            eprintln!(
                "{}",
                formatter.success(&format!("{} deployment(s) pushed", results.len()))
            );
        }
    }

    Ok(())
}

/// Show what a deploy would change.
async fn cmd_diff(cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    let (config, config_dir, _) = load_config(cli.config.as_ref())?;
    let repo = RepoContext::discover(&config_dir)?;
    let client = create_prefect_client()?;

    let results = Reconciler::new(&config, &config_dir, &client, &repo)
        .with_options(cli.merge_options())
        .preview()
        .await?;

    emit(&formatter.format_preview(&results))
}

/// Writes a command report to stdout; logs and status messages stay on stderr.
fn emit(output: &str) -> Result<()> {
    write_report(&mut std::io::stdout().lock(), output)
}

fn write_report(out: &mut impl Write, output: &str) -> Result<()> {
    writeln!(out, "{output}")?;
    out.flush()?;
    Ok(())
}

/// Resolves the deploy file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads and validates the deploy file; returns it with its absolute directory.
fn load_config(config_path: Option<&PathBuf>) -> Result<(DeployConfig, PathBuf, ValidationResult)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading deploy file from: {}", config_file.display());

    let config_dir = config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let parser = ConfigParser::new().with_base_path(config_dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;

    let config_dir = config_dir.canonicalize()?;
    Ok((config, config_dir, result))
}

/// Creates a Prefect API client from the environment or active profile.
fn create_prefect_client() -> Result<PrefectClient> {
    let settings = ApiSettings::load()?;
    PrefectClient::new(&settings)
}
