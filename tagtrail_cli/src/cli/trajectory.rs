use std::path::PathBuf;

use clap::Args;
use tagtrail_core::ids::{DeviceSerial, UserId};

use crate::cli::common::{build_engine, parse_epoch_secs};

#[derive(Debug, Args)]
pub(crate) struct TrajectoryCommand {
    #[arg(long, default_value = "tagtrail.sqlite")]
    db: PathBuf,

    #[arg(long)]
    user_id: String,

    #[arg(long)]
    serial: String,

    /// Range start, epoch seconds.
    #[arg(long)]
    start: i64,

    /// Range end, epoch seconds.
    #[arg(long)]
    end: i64,
}

impl TrajectoryCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let engine = build_engine(&self.db, "tagtrail-cli-trajectory/0.1").await?;
        let start = parse_epoch_secs(self.start, "start")?;
        let end = parse_epoch_secs(self.end, "end")?;

        let trajectory = engine
            .query_trajectory(
                &UserId(self.user_id.clone()),
                &DeviceSerial(self.serial.clone()),
                start,
                end,
            )
            .await?;

        match trajectory {
            Some(trajectory) => println!("{}", serde_json::to_string_pretty(&trajectory)?),
            None => println!(
                "No points stored for {} between {start} and {end}.",
                self.serial
            ),
        }
        Ok(())
    }
}
