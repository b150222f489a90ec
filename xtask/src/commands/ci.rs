use anyhow::Result;
use clap::{Args, Subcommand};
use xshell::{Shell, cmd};

use super::common;

#[derive(Args)]
pub struct Ci {
    #[command(subcommand)]
    command: Option<CiCommand>,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Run cargo fmt check
    Fmt,
    /// Run cargo clippy
    Clippy,
    /// Run cargo test
    Test(TestArgs),
    /// Run every demo scenario and fail on any rejected step
    Scenarios,
}

#[derive(Args, Default)]
pub struct TestArgs {
    /// Additional arguments to pass to cargo test
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Ci {
    pub fn run(&self, sh: &Shell) -> Result<()> {
        match &self.command {
            Some(cmd) => cmd.run(sh),
            None => {
                CiCommand::Fmt.run(sh)?;
                CiCommand::Clippy.run(sh)?;
                CiCommand::Test(TestArgs::default()).run(sh)?;
                CiCommand::Scenarios.run(sh)?;
                Ok(())
            }
        }
    }
}

impl CiCommand {
    pub fn run(&self, sh: &Shell) -> Result<()> {
        match self {
            CiCommand::Fmt => common::run_fmt_check(sh),
            CiCommand::Clippy => common::run_clippy(sh),
            CiCommand::Test(test_args) => {
                eprintln!("Running cargo test...");
                let args = &test_args.args;
                cmd!(sh, "cargo test --workspace {args...}").run()?;
                Ok(())
            }
            CiCommand::Scenarios => {
                for scenario in common::demo_scenarios(sh)? {
                    common::run_scenario(sh, &scenario, "json")?;
                }
                Ok(())
            }
        }
    }
}
