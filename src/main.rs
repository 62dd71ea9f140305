use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use svc_triage::cli::{Args, CollectOpts, Commands, IncidentCommands};
use svc_triage::config::ToolkitConfig;
use svc_triage::constants::{EXIT_CONFIG_ERROR, EXIT_OK};
use svc_triage::incident::{collect_incident, exit_code};
use svc_triage::preflight::check_required_commands;
use svc_triage::utils::bundle::is_bundle_collision;

fn main() -> ExitCode {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = initialize_logging(args.verbose) {
        eprintln!("{:#}", e);
    }

    let code = match &args.command {
        Commands::InitConfig { path } => init_config(path),
        Commands::Incident(IncidentCommands::Collect(opts)) => collect(opts),
    };
    ExitCode::from(code)
}

/// Log to stderr so stdout carries only the archive path
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(log_level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

fn init_config(path: &std::path::Path) -> u8 {
    match ToolkitConfig::create_default_config_file(path) {
        Ok(()) => {
            info!("Configuration created at {}; set service.unit before collecting", path.display());
            EXIT_OK
        }
        Err(e) => {
            error!("{:#}", e);
            EXIT_CONFIG_ERROR
        }
    }
}

/// Load the file, apply command-line overrides and validate
fn load_config(opts: &CollectOpts) -> Result<ToolkitConfig> {
    let mut config = ToolkitConfig::from_yaml_file(&opts.config)?;
    config.apply_overrides(&opts.overrides());
    config.validate()?;
    Ok(config)
}

fn collect(opts: &CollectOpts) -> u8 {
    let config = match load_config(opts) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let missing_commands = check_required_commands();

    let result = collect_incident(&config, &missing_commands);
    match &result {
        Ok(outcome) => {
            println!("{}", outcome.archive.display());

            let failed = outcome.report.failed();
            if failed.is_empty() {
                info!("All collectors succeeded");
            } else {
                warn!("Collectors failed: {}", failed.join(", "));
            }
        }
        Err(e) if is_bundle_collision(e) => {
            error!(
                "{:#}. Another collection for this service started within the same second.",
                e
            );
        }
        Err(e) => error!("Collection failed: {:#}", e),
    }
    exit_code(&result)
}
