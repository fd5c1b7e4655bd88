//! Worker process entry point: connects to the broker and consumes
//! attempts until the process is killed.

use anyhow::Context;
use judge_core::intake::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let worker = Worker::connect()
        .await
        .context("failed to connect to the broker")?;

    tracing::info!("judge worker ready");
    worker.run().await.context("worker loop exited")?;
    Ok(())
}
