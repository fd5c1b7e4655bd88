//! Runs a single attempt read from a JSON file on disk and prints the
//! resulting verdict, for local testing and ops scripts that need to judge
//! one submission directly instead of going through the broker.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use judge_core::model::Attempt;

#[derive(Parser, Debug)]
#[command(
    name = "judge-once",
    about = "Run a single attempt described by a JSON file and print its verdict"
)]
struct Args {
    /// Path to a JSON file holding one Attempt.
    attempt_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let body = std::fs::read_to_string(&args.attempt_file)
        .with_context(|| format!("reading {}", args.attempt_file.display()))?;
    let attempt: Attempt = serde_json::from_str(&body).context("parsing attempt JSON")?;

    let verdict = judge_core::executor::execute(&attempt);
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
