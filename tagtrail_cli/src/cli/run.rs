use std::path::PathBuf;

use clap::Args;
use tokio::{sync::watch, time::Duration};

use crate::cli::common::build_engine;

#[derive(Debug, Args)]
pub(crate) struct RunCommand {
    #[arg(long, default_value = "tagtrail.sqlite")]
    db: PathBuf,

    /// Seconds between reconciliation passes.
    #[arg(long, default_value_t = 600)]
    interval: u64,
}

impl RunCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let engine = build_engine(&self.db, "tagtrail-cli-run/0.1").await?;
        let interval = Duration::from_secs(self.interval);

        println!("Persisting locations to {}", self.db.display());
        println!("Syncing every {}s. Press Ctrl+C to stop.", self.interval);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = tokio::spawn(async move {
            engine.run_until_shutdown(interval, shutdown_rx).await
        });

        tokio::select! {
            outcome = &mut scheduler => {
                match outcome {
                    Ok(Ok(())) => eprintln!("Scheduler exited cleanly."),
                    Ok(Err(error)) => anyhow::bail!("scheduler failed: {error}"),
                    Err(error) => anyhow::bail!("scheduler task join failed: {error}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping after the current pass...");
                let _ = shutdown_tx.send(true);
                scheduler
                    .await
                    .map_err(|error| anyhow::anyhow!("scheduler task join failed: {error}"))??;
            }
        }

        Ok(())
    }
}
