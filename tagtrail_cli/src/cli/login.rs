use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tagtrail_core::{
    Credential,
    ids::{AccountId, UserId},
};

use crate::cli::common::build_engine;

#[derive(Debug, Args)]
pub(crate) struct LoginCommand {
    #[arg(long, default_value = "tagtrail.sqlite")]
    db: PathBuf,

    /// Dashboard user id to register the credential under.
    #[arg(long)]
    user_id: String,

    /// CityTag login identifier (email).
    #[arg(long)]
    email: String,

    /// CityTag password. Falls back to $CITYTAG_PASSWORD.
    #[arg(long)]
    password: Option<String>,

    /// CityTag numeric account id.
    #[arg(long)]
    account_id: u64,
}

impl LoginCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let engine = build_engine(&self.db, "tagtrail-cli-login/0.1").await?;

        let secret = match &self.password {
            Some(password) => password.clone(),
            None => std::env::var("CITYTAG_PASSWORD")
                .context("password is required; provide --password or set CITYTAG_PASSWORD")?,
        };

        let credential = Credential {
            user_id: UserId(self.user_id.clone()),
            login_identifier: self.email.clone(),
            secret,
            account_id: AccountId(self.account_id),
        };

        let token = engine.authenticate(&credential).await?;
        println!("Login succeeded for {}.", self.user_id);
        println!("Session token: {token}");
        Ok(())
    }
}
