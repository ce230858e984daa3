use std::{env, path::Path};

use anyhow::Context;
use tagtrail_citytag::{CityTagConfig, HttpCityTagClient};
use tagtrail_core::Timestamp;
use tagtrail_engine::SyncEngine;

const DEFAULT_BASE_URL: &str = "http://citytag.yuminstall.top";

pub(crate) fn load_citytag_config(default_user_agent: &'static str) -> CityTagConfig {
    CityTagConfig {
        base_url: env::var("CITYTAG_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
        user_agent: env::var("TAGTRAIL_USER_AGENT").unwrap_or_else(|_| default_user_agent.into()),
    }
}

pub(crate) async fn build_engine(
    db: &Path,
    default_user_agent: &'static str,
) -> anyhow::Result<SyncEngine<HttpCityTagClient>> {
    let config = load_citytag_config(default_user_agent);
    SyncEngine::connect(db, config)
        .await
        .context("failed to open the tagtrail database")
}

pub(crate) fn parse_epoch_secs(raw: i64, which: &'static str) -> anyhow::Result<Timestamp> {
    Timestamp::from_epoch_secs(raw)
        .with_context(|| format!("{which} is not a valid epoch-seconds timestamp: {raw}"))
}
