//! # seqtune
//!
//! Inspect and export hyperparameter studies without writing code.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use seqtune::{Study, TunerConfig, storage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seqtune")]
#[command(about = "Inspect resumable hyperparameter studies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the studies held by a store
    Studies {
        /// Store location (memory, journal:<path>, sqlite:///<path>, *.db, *.jsonl)
        #[arg(short, long)]
        storage: String,
    },

    /// Print trial counts and the best trial of a study
    Summary {
        /// Store location
        #[arg(short, long)]
        storage: String,

        /// Study name
        #[arg(long)]
        study: String,
    },

    /// Write every trial of a study as CSV or JSON
    Export {
        /// Store location
        #[arg(short, long)]
        storage: String,

        /// Study name
        #[arg(long)]
        study: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a TOML tuner configuration and print it with defaults filled in
    CheckConfig {
        /// Path to the TOML file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn open_study(location: &str, name: &str) -> anyhow::Result<Study> {
    let storage = storage::open(location).with_context(|| format!("opening store {location}"))?;
    Study::open(storage, name).with_context(|| format!("opening study {name}"))
}

fn output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Studies { storage: location } => {
            let storage = storage::open(&location)?;
            let names = storage.study_names()?;
            if names.is_empty() {
                bail!("no studies in {location}");
            }
            for name in names {
                let study = Study::open(storage.clone(), &name)?;
                println!(
                    "{name}\t{}\t{}",
                    study.direction(),
                    study.state_counts()?
                );
            }
        }
        Commands::Summary { storage, study } => {
            let study = open_study(&storage, &study)?;
            println!("{}", study.summary()?);
        }
        Commands::Export {
            storage,
            study,
            format,
            output: path,
        } => {
            let study = open_study(&storage, &study)?;
            let mut out = output(path.as_ref())?;
            match format {
                Format::Csv => study.to_csv(&mut out)?,
                Format::Json => writeln!(out, "{}", study.export()?.to_json()?)?,
            }
            out.flush()?;
            tracing::info!(study = study.name(), "export written");
        }
        Commands::CheckConfig { path } => {
            let config = TunerConfig::from_path(&path)?;
            let space = config.build_space()?;
            config.build_sampler()?;
            config.build_pruner()?;
            tracing::info!(
                path = %path.display(),
                fields = space.len(),
                "configuration is valid"
            );
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    run(Cli::parse())
}
