use std::path::PathBuf;

use clap::Args;

use crate::cli::common::build_engine;

#[derive(Debug, Args)]
pub(crate) struct SyncCommand {
    #[arg(long, default_value = "tagtrail.sqlite")]
    db: PathBuf,

    /// Use the wide backfill window instead of the periodic one.
    #[arg(long)]
    full: bool,
}

impl SyncCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let engine = build_engine(&self.db, "tagtrail-cli-sync/0.1").await?;

        let summary = if self.full {
            engine.run_full_sync_pass().await?
        } else {
            engine.run_reconciliation_pass().await?
        };

        println!("Users processed:         {:3}", summary.users_processed);
        println!("Successful re-logins:    {:3}", summary.re_logins);
        println!("Devices processed:       {:3}", summary.devices_processed);
        println!("Points inserted/updated: {:3}", summary.points_written);
        Ok(())
    }
}
