use std::path::PathBuf;

use clap::Args;
use tagtrail_core::ids::{DeviceSerial, UserId};

use crate::cli::common::build_engine;

#[derive(Debug, Args)]
pub(crate) struct LatestCommand {
    #[arg(long, default_value = "tagtrail.sqlite")]
    db: PathBuf,

    #[arg(long)]
    user_id: String,

    #[arg(long)]
    serial: String,
}

impl LatestCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let engine = build_engine(&self.db, "tagtrail-cli-latest/0.1").await?;

        let latest = engine
            .latest_position(
                &UserId(self.user_id.clone()),
                &DeviceSerial(self.serial.clone()),
            )
            .await?;

        match latest {
            Some(raw) => println!("{}", serde_json::to_string_pretty(&raw)?),
            None => println!("No recent position reported for {}.", self.serial),
        }
        Ok(())
    }
}
