use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use kinesis::{config::Config, scenario};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the scenario file (TOML or JSON).
    pub scenario: PathBuf,

    /// How to print the report.
    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

impl RunArgs {
    pub fn run(&self) -> Result<()> {
        let config = Config::from_file(&self.scenario)?;

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .context("invalid logging.level")?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();

        config.validate()?;
        tracing::info!("Running scenario {}", self.scenario.display());

        let report = scenario::run(&config)?;
        match self.format {
            Format::Text => println!("{report}"),
            Format::Json => println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to encode report")?
            ),
        }
        Ok(())
    }
}
