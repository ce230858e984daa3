use clap::{ArgAction, Parser, Subcommand};

use crate::cli::{
    latest::LatestCommand, login::LoginCommand, run::RunCommand, sync::SyncCommand,
    trajectory::TrajectoryCommand,
};

pub(crate) fn get_args() -> CliOpts {
    CliOpts::parse()
}

#[derive(Debug, Parser)]
#[command(version = clap::crate_version!(), about = "CityTag telemetry sync engine")]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the periodic sync scheduler until Ctrl+C.
    Run(RunCommand),

    /// Run a single reconciliation pass and exit.
    Sync(SyncCommand),

    /// Log a user into CityTag and store the session.
    Login(LoginCommand),

    /// Fetch a device's live position from the provider.
    Latest(LatestCommand),

    /// Print a stored trajectory for a device and time range.
    Trajectory(TrajectoryCommand),
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            Command::Run(cmd) => cmd.run().await,
            Command::Sync(cmd) => cmd.run().await,
            Command::Login(cmd) => cmd.run().await,
            Command::Latest(cmd) => cmd.run().await,
            Command::Trajectory(cmd) => cmd.run().await,
        }
    }
}
