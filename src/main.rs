// LMS Activity Simulator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/lms-activity-simulator --catalog catalog.json generate --students 4,7 --courses 120
// ```
//
// The response envelope of every operation is printed to stdout as JSON;
// progress and summaries go to stderr.

use std::process;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use lms_activity_simulator::api::ResponseEnvelope;
use lms_activity_simulator::content::{ContentCatalog, ContentHierarchyProvider};
use lms_activity_simulator::simulation::{ActivitySimulator, GenerationSummary, LoggingConfig};
use lms_activity_simulator::store::MemoryStore;
use lms_activity_simulator::types::config::{CliArgs, Command};
use lms_activity_simulator::types::SimulationConfig;

fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    if args.print_config {
        match SimulationConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    let logging_guard = match LoggingConfig::from_cli_args(&args).init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    match run(&args) {
        Ok(true) => info!("LMS Activity Simulator completed successfully"),
        Ok(false) => {
            drop(logging_guard);
            process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            drop(logging_guard);
            process::exit(1);
        }
    }
}

/// Run the selected operation; `Ok(false)` means a failure envelope was printed
fn run(args: &CliArgs) -> anyhow::Result<bool> {
    let Some(command) = args.command.clone() else {
        bail!("No operation given; use one of generate, export or cleanup (see --help)");
    };

    let config = SimulationConfig::from_cli_args(args).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    info!("Configuration loaded and validated successfully");

    let catalog = match &args.catalog {
        Some(path) => ContentCatalog::from_file(path)
            .with_context(|| format!("Failed to load content catalog {}", path))?,
        None if matches!(command, Command::Generate(_)) => {
            bail!("generate needs a content catalog (--catalog)")
        }
        None => ContentCatalog::new(),
    };

    let store = MemoryStore::load(&args.state)
        .with_context(|| format!("Failed to load state file {}", args.state))?;
    let mut simulator = ActivitySimulator::new(store, catalog, config)?;

    let succeeded = match command {
        Command::Generate(generate) => {
            let courses = if generate.all_courses {
                simulator.provider().list_courses()
            } else {
                generate.courses
            };
            eprintln!(
                "Generating activity for {} student(s) across {} course(s)...",
                generate.students.len(),
                courses.len()
            );
            let request = simulator.request(generate.students, courses);
            let envelope = simulator.handle_generate(request);
            if let Some(batch) = envelope.data() {
                eprintln!("{}", GenerationSummary::from_batch(batch));
            }
            emit(&envelope)?
        }
        Command::Export => {
            let envelope = simulator.handle_export();
            if let Some(receipt) = envelope.data() {
                eprintln!("Export written to {}", receipt.path);
            }
            emit(&envelope)?
        }
        Command::Cleanup => {
            let envelope = simulator.handle_cleanup();
            if let Some(report) = envelope.data() {
                eprintln!(
                    "Removed {} activity records, {} meta rows and {} markers for {} student(s)",
                    report.deleted_activity, report.deleted_meta, report.deleted_markers, report.students
                );
            }
            emit(&envelope)?
        }
    };

    if succeeded {
        simulator
            .into_store()
            .save(&args.state)
            .with_context(|| format!("Failed to save state file {}", args.state))?;
    }
    Ok(succeeded)
}

/// Print the envelope as JSON to stdout
fn emit<T: Serialize>(envelope: &ResponseEnvelope<T>) -> anyhow::Result<bool> {
    let json = serde_json::to_string_pretty(envelope).context("Failed to serialize response")?;
    println!("{}", json);
    Ok(envelope.is_success())
}
