use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use xshell::{Shell, cmd};

/// Ensures nightly rustfmt is available, installing if necessary
pub fn ensure_nightly_rustfmt(sh: &Shell) -> Result<()> {
    if cmd!(sh, "cargo +nightly fmt --version")
        .quiet()
        .run()
        .is_err()
    {
        eprintln!("Installing nightly rustfmt...");
        cmd!(
            sh,
            "rustup toolchain install nightly --profile minimal --component rustfmt"
        )
        .run()?;
    }
    Ok(())
}

/// Run rustfmt check (does not modify files)
pub fn run_fmt_check(sh: &Shell) -> Result<()> {
    ensure_nightly_rustfmt(sh)?;
    eprintln!("Running cargo fmt check...");
    cmd!(sh, "cargo +nightly fmt --all -- --check").run()?;
    Ok(())
}

/// Apply rustfmt to all files
pub fn run_fmt(sh: &Shell) -> Result<()> {
    ensure_nightly_rustfmt(sh)?;
    eprintln!("Applying cargo fmt...");
    cmd!(sh, "cargo +nightly fmt --all").run()?;
    Ok(())
}

/// Run clippy with all warnings treated as errors
pub fn run_clippy(sh: &Shell) -> Result<()> {
    eprintln!("Running cargo clippy...");
    cmd!(sh, "cargo clippy --all-targets --workspace -- -D warnings").run()?;
    Ok(())
}

/// Scenario files under `demos/`, sorted by name
pub fn demo_scenarios(sh: &Shell) -> Result<Vec<PathBuf>> {
    let mut scenarios: Vec<_> = sh
        .read_dir("demos")
        .context("failed to list demos/")?
        .into_iter()
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("toml" | "json")
            )
        })
        .collect();
    scenarios.sort();
    Ok(scenarios)
}

/// Run one scenario through the CLI, failing if any step was rejected.
///
/// The JSON report is always produced for the check; with `text` the
/// scenario runs a second time for the printed output.
pub fn run_scenario(sh: &Shell, scenario: &Path, format: &str) -> Result<()> {
    eprintln!("Running scenario {}...", scenario.display());
    let run = |format: &str| {
        cmd!(sh, "cargo run --quiet -p kinesis -- run {scenario} --format {format}")
            .read()
            .with_context(|| format!("scenario {} failed", scenario.display()))
    };
    let report = run("json")?;
    let output = if format == "json" { report.clone() } else { run(format)? };
    println!("{output}");

    let failures = rejected_steps(&report)
        .with_context(|| format!("scenario {} printed an invalid report", scenario.display()))?;
    if failures > 0 {
        anyhow::bail!("scenario {} rejected {failures} steps", scenario.display());
    }
    Ok(())
}

/// Number of rejected steps in a JSON report
fn rejected_steps(report: &str) -> Result<usize> {
    let report: serde_json::Value = serde_json::from_str(report)?;
    let failures = report["failures"]
        .as_array()
        .context("report has no failures list")?;
    Ok(failures.len())
}
