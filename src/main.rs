//! samwise CLI entry point.
//!
//! This binary provides the command-line interface for samwise.

use clap::Parser;
use samwise::cli::{CheckArgs, Cli, Commands, UpdateArgs};
use samwise::config::DEFAULT_CONFIG_FILES;
use samwise::reporter::Reporter;
use samwise::{Config, SamwiseError, Scanner};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long blocked git calls may hold the process open after the run ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => return fatal(&e.into()),
    };

    // Run the appropriate command
    let outcome = runtime.block_on(run(cli));

    // A git call that outlived its deadline must not keep the process alive
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match outcome {
        Ok(exit_code) => exit_code,
        Err(e) => fatal(&e),
    }
}

fn fatal(e: &anyhow::Error) -> ExitCode {
    tracing::error!(error = %e, "Fatal error");

    eprintln!("Error: {e}");

    // Print error chain (cause chain)
    let mut source = e.source();
    if source.is_some() {
        eprintln!("\nCaused by:");
        let mut i = 0;
        while let Some(cause) = source {
            eprintln!("  {i}: {cause}");
            source = cause.source();
            i += 1;
        }
    }

    let code = e
        .downcast_ref::<SamwiseError>()
        .map_or(1, SamwiseError::exit_code);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[allow(unsafe_code)]
fn bound_git_transport(config: &Config) {
    // SAFETY: called before the scanner starts any git2 work
    if let Err(e) = unsafe { samwise::git::set_transport_timeouts(config.git.timeout()) } {
        tracing::warn!(error = %e, "Could not set git transport timeouts");
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        // RUST_LOG wins over the verbose flag
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let base_level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("warn,samwise={base_level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Check(ref args) => {
            let mut config = load_config(&cli)?;
            config.merge_check_args(args);
            check(config, args, cli.quiet).await
        }

        Commands::Update(ref args) => {
            let mut config = load_config(&cli)?;
            config.merge_update_args(args);
            update(config, args, cli.quiet).await
        }

        Commands::Init => {
            let config_path = Path::new(DEFAULT_CONFIG_FILES[0]);
            if config_path.exists() {
                anyhow::bail!("Configuration file already exists: {}", config_path.display());
            }

            std::fs::write(config_path, Config::example_yaml())?;
            println!("Created example configuration: {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate(ref args) => {
            let content = std::fs::read_to_string(&args.config)?;
            match Config::from_yaml(&content).and_then(|c| c.validate()) {
                Ok(()) => {
                    println!("Configuration is valid: {}", args.config.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    Ok(ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1)))
                }
            }
        }
    }
}

async fn check(config: Config, args: &CheckArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    // Unsupported formats abort before anything is scanned
    config.validate()?;
    bound_git_transport(&config);

    let scanner = Scanner::new(config.clone());
    let result = scanner.check(&args.path).await?;

    let reporter = Reporter::new(&config);
    let report_path = reporter.write_report(&result, &args.path)?;
    let failure_path = reporter.write_failure_report(&result, &args.path)?;

    if !quiet {
        println!("{}", reporter.summary(&result)?);
        println!("Report written to {}", report_path.display());
        if let Some(path) = failure_path {
            println!("Failures written to {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn update(config: Config, args: &UpdateArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    config.validate()?;
    bound_git_transport(&config);
    let scanner = Scanner::new(config.clone());

    let (root, result) = match (&args.repo, &args.path) {
        (Some(url), _) => scanner.update_repository(url, args.workdir.as_deref()).await?,
        (None, Some(path)) => (path.clone(), scanner.update(path).await?),
        (None, None) => anyhow::bail!("either --path or --repo is required"),
    };

    let reporter = Reporter::new(&config);
    let failure_path = reporter.write_failure_report(&result, &root)?;

    if !quiet {
        println!("{}", reporter.summary(&result)?);
        if args.repo.is_some() {
            println!("Working copy at {}", root.display());
        }
        if let Some(path) = failure_path {
            println!("Failures written to {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    // Check for explicit config file
    if let Some(ref config_path) = cli.config {
        tracing::debug!(path = %config_path.display(), "Loading configuration from explicit path");
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| SamwiseError::io(config_path, e, file!(), line!()))?;
        let mut config = Config::from_yaml(&content)?;
        config.load_credentials_from_env();
        return Ok(config);
    }

    tracing::debug!("Searching for default configuration files");
    for path in DEFAULT_CONFIG_FILES {
        let path = Path::new(path);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Found configuration file");
            let content = std::fs::read_to_string(path).map_err(|e| SamwiseError::io(path, e, file!(), line!()))?;
            let mut config = Config::from_yaml(&content)?;
            config.load_credentials_from_env();
            return Ok(config);
        }
    }

    tracing::debug!("No configuration file found, using default configuration");
    let mut config = Config::default();
    config.load_credentials_from_env();
    Ok(config)
}
