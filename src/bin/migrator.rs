//! Schema Registry Migrator CLI
//!
//! Copies a registry between a live instance, snapshot files, log dumps and
//! a log topic, or checks two of them for equivalence.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use schema_migrator::config::MigratorConfig;
use schema_migrator::{pipeline, sink, source, Action};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-migrator")]
#[command(about = "Migrate and validate schema registry state")]
struct Cli {
    /// Configuration file, layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured action
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy `source` into `sink`
    Migrate,
    /// Compare `source_a` with `source_b`
    Validate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = MigratorConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let requested = cli.command.map(|command| match command {
        Commands::Migrate => Action::Migrate,
        Commands::Validate => Action::Validate,
    });
    let action = config.action(requested)?;

    match action {
        Action::Migrate => {
            let (source_spec, sink_spec) = config.migrate_plan()?;
            let source = source::build(source_spec).context("Failed to set up source")?;
            let mut sink = sink::build(sink_spec);
            pipeline::migrate(source.as_ref(), sink.as_mut(), &config.processors)
                .context("Migration failed")?;
            info!("migration complete");
        }
        Action::Validate => {
            let (spec_a, spec_b) = config.validate_plan()?;
            let source_a = source::build(spec_a).context("Failed to set up source_a")?;
            let source_b = source::build(spec_b).context("Failed to set up source_b")?;
            pipeline::validate(source_a.as_ref(), source_b.as_ref(), &config.processors)
                .context("Validation failed")?;
            println!("✅ Sources match");
        }
    }

    Ok(())
}
