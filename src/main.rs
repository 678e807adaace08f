use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use postclone::config::OrchestratorConfig;
use postclone::environment::EnvironmentKind;
use postclone::pipeline::Orchestrator;
use postclone::properties::StoredProperties;
use postclone::report::{Disposition, RunReport, StepResult};
use postclone::steps::StepEffect;
use postclone::storage::JsonlStorage;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("postclone")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("postclone.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &OrchestratorConfig) -> Result<()> {
    let store_path = cli.store.clone().unwrap_or_else(|| config.storage.path.clone());
    if cli.is_verbose() {
        println!("{} {}", "Record store:".yellow(), store_path.display());
    }

    let storage = JsonlStorage::new(&store_path)
        .with_context(|| format!("Failed to open record store at {}", store_path.display()))?;
    let properties = StoredProperties::new(&storage);
    let orchestrator = Orchestrator::new(config, &storage, &properties);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => handle_run_command(&orchestrator, cli.is_verbose()),
        Commands::Plan => handle_plan_command(&orchestrator),
        Commands::Classify => handle_classify_command(&orchestrator),
    }
}

fn colored_kind(kind: EnvironmentKind) -> ColoredString {
    match kind {
        EnvironmentKind::Development | EnvironmentKind::Qa => kind.to_string().as_str().green(),
        EnvironmentKind::Production => kind.to_string().as_str().red().bold(),
        EnvironmentKind::Unknown => kind.to_string().as_str().yellow(),
    }
}

fn handle_classify_command(orchestrator: &Orchestrator) -> Result<()> {
    let classification = orchestrator.classify();
    info!("Classified '{}' as {}", classification.instance, classification.kind);
    if let Some(err) = &classification.identity_error {
        println!("{} {}", "Could not read instance name:".red(), err);
    }
    println!("{} -> {}", classification.instance, colored_kind(classification.kind));
    Ok(())
}

fn handle_plan_command(orchestrator: &Orchestrator) -> Result<()> {
    let (classification, pipeline) = orchestrator.plan();
    println!("{} -> {}", classification.instance, colored_kind(classification.kind));

    match classification.kind {
        EnvironmentKind::Production => println!("{}", "Production instance: nothing will run".red()),
        EnvironmentKind::Unknown => println!("{}", "Unrecognized instance: nothing will run".yellow()),
        EnvironmentKind::Development | EnvironmentKind::Qa => {
            for (index, step) in pipeline.steps().iter().enumerate() {
                println!("  {:>2}. {}", index + 1, step);
            }
        }
    }
    Ok(())
}

fn handle_run_command(orchestrator: &Orchestrator, verbose: bool) -> Result<()> {
    let report = orchestrator.run();
    report.emit();
    print_summary(&report, verbose);

    if let Some(reason) = &report.aborted {
        eyre::bail!("Pipeline aborted: {}", reason);
    }
    Ok(())
}

fn print_summary(report: &RunReport, verbose: bool) {
    println!("{} -> {}", report.instance, colored_kind(report.environment));

    match report.disposition {
        Disposition::RefusedProduction => {
            println!("{}", "Refusing to run on a production instance".red().bold());
            return;
        }
        Disposition::Unrecognized => {
            println!("{}", "Instance is not known; nothing was changed".yellow());
            return;
        }
        Disposition::Applied => {}
    }

    for outcome in &report.steps {
        let status = if outcome.has_failures() { "FAIL".red() } else { "ok".green() };
        println!("  [{}] {}", status, outcome.step);
        if verbose {
            match &outcome.result {
                StepResult::Failed(err) => println!("       {}", err),
                StepResult::Applied(StepEffect::Records(r)) => {
                    println!("       {} matched, {} updated", r.matched, r.updated)
                }
                StepResult::Applied(StepEffect::Skipped(reason)) => println!("       skipped: {}", reason),
                StepResult::Applied(StepEffect::PropertiesSet(keys)) => println!("       {}", keys.join(", ")),
            }
        }
    }

    println!(
        "{} {} of {} steps clean, {} records updated in {}ms",
        "Done:".cyan(),
        report.succeeded(),
        report.steps.len(),
        report.records_updated(),
        report.duration().num_milliseconds()
    );
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = OrchestratorConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
