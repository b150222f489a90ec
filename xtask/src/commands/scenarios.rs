use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use xshell::Shell;

use super::common;

#[derive(Args)]
pub struct Scenarios {
    /// Scenario files to run. Defaults to everything under `demos/`.
    scenarios: Vec<PathBuf>,

    /// Print JSON reports instead of text
    #[arg(long)]
    json: bool,
}

impl Scenarios {
    pub fn run(&self, sh: &Shell) -> Result<()> {
        let scenarios = if self.scenarios.is_empty() {
            common::demo_scenarios(sh)?
        } else {
            self.scenarios.clone()
        };
        let format = if self.json { "json" } else { "text" };
        for scenario in &scenarios {
            common::run_scenario(sh, scenario, format)?;
        }
        Ok(())
    }
}
