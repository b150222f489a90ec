use anyhow::Result;
use clap::Subcommand;
use xshell::Shell;

pub mod ci;
pub mod common;
pub mod fmt;
pub mod scenarios;

#[derive(Subcommand)]
pub enum Command {
    /// Run CI checks (fmt, clippy, test, scenarios). Runs all if no subcommand specified.
    Ci(ci::Ci),
    /// Apply rustfmt to all files
    Fmt(fmt::Fmt),
    /// Run the demo scenarios through the CLI
    Scenarios(scenarios::Scenarios),
    /// Run tests
    Test(test::Test),
}

impl Command {
    pub fn run(self, sh: &Shell) -> Result<()> {
        match self {
            Command::Ci(cmd) => cmd.run(sh),
            Command::Fmt(cmd) => cmd.run(sh),
            Command::Scenarios(cmd) => cmd.run(sh),
            Command::Test(cmd) => cmd.run(sh),
        }
    }
}
