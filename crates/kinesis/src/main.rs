use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => args.run(),
        Command::Plan(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "kinesis", about = "Kinematic motion scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario file and print the final state.
    Run(cli::run::RunArgs),
    /// Solve a single move and print its phases.
    Plan(cli::plan::PlanArgs),
}
