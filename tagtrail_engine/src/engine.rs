use std::{path::Path, time::Duration};

use serde_json::Value;
use tagtrail_citytag::{
    CityTagApi, CityTagConfig, HttpCityTagClient, PassSummary, ReconcilerConfig, SyncReconciler,
};
use tagtrail_core::{
    Credential, Timestamp,
    ids::{DeviceSerial, UserId},
};
use tagtrail_store::{LocationStore, SessionStore};
use tokio::sync::watch;

use crate::{
    EngineError,
    queries::{Playback, Trajectory},
};

/// How often the periodic scheduler sweeps all users.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Trailing window for the on-demand full sync, wide enough to backfill a
/// device that has been offline for days.
pub const FULL_SYNC_WINDOW: Duration = Duration::from_secs(10 * 24 * 60 * 60);

/// The sync engine's public face: owns the provider client and both stores,
/// exposes the reconciliation pass, interactive authentication and the
/// read-side queries, and drives the periodic scheduler.
pub struct SyncEngine<C>
where
    C: CityTagApi + Clone + Send + Sync,
{
    client: C,
    locations: LocationStore,
    sessions: SessionStore,
    reconciler: SyncReconciler<C, SessionStore, LocationStore>,
}

impl SyncEngine<HttpCityTagClient> {
    pub async fn connect(
        database_path: impl AsRef<Path>,
        config: CityTagConfig,
    ) -> Result<Self, EngineError> {
        let pool = tagtrail_store::connect(database_path).await?;
        let client = HttpCityTagClient::new(config)?;
        Ok(Self::from_parts(
            client,
            LocationStore::new(pool.clone()),
            SessionStore::new(pool),
            ReconcilerConfig::default(),
        ))
    }
}

impl<C> SyncEngine<C>
where
    C: CityTagApi + Clone + Send + Sync,
{
    pub fn from_parts(
        client: C,
        locations: LocationStore,
        sessions: SessionStore,
        config: ReconcilerConfig,
    ) -> Self {
        let reconciler =
            SyncReconciler::new(client.clone(), sessions.clone(), locations.clone(), config);
        Self {
            client,
            locations,
            sessions,
            reconciler,
        }
    }

    pub fn locations(&self) -> &LocationStore {
        &self.locations
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// One full sweep over all registered users with the periodic trailing
    /// window. Also the entry point for external cron-style triggers.
    pub async fn run_reconciliation_pass(&self) -> Result<PassSummary, EngineError> {
        Ok(self.reconciler.run_pass().await?)
    }

    /// A sweep with the wide backfill window.
    pub async fn run_full_sync_pass(&self) -> Result<PassSummary, EngineError> {
        Ok(self
            .reconciler
            .run_pass_with_window(FULL_SYNC_WINDOW)
            .await?)
    }

    /// Interactive login: register (or refresh) the credential, obtain a
    /// fresh provider session and return its token. Shares the login path
    /// with the reconciler's re-login branch.
    pub async fn authenticate(&self, credential: &Credential) -> Result<String, EngineError> {
        self.sessions.upsert_credential(credential).await?;
        let session = self.reconciler.authenticate(credential).await?;
        Ok(session.token)
    }

    /// Live position for one device, straight from the provider using the
    /// stored session. Surfaces the provider's error unmodified when the
    /// session has gone stale; the caller decides whether to re-login.
    pub async fn latest_position(
        &self,
        user_id: &UserId,
        serial: &DeviceSerial,
    ) -> Result<Option<Value>, EngineError> {
        let credential = self
            .sessions
            .find_credential(user_id)
            .await?
            .ok_or_else(|| EngineError::UnknownUser(user_id.clone()))?;
        let session = self
            .sessions
            .load_session(user_id)
            .await?
            .ok_or_else(|| EngineError::MissingSession(user_id.clone()))?;

        Ok(self
            .client
            .latest_location(credential.account_id, &session.token, serial)
            .await?)
    }

    pub async fn query_trajectory(
        &self,
        user_id: &UserId,
        serial: &DeviceSerial,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Option<Trajectory>, EngineError> {
        let points = self.locations.query(user_id, serial, start, end).await?;
        Ok(Trajectory::from_points(&points, serial.clone(), start, end))
    }

    pub async fn query_playback(
        &self,
        user_id: &UserId,
        serial: &DeviceSerial,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Option<Playback>, EngineError> {
        let points = self.locations.query(user_id, serial, start, end).await?;
        Ok(Playback::from_points(&points, serial.clone(), start, end))
    }

    /// The periodic scheduler: one pass immediately, then sleep-then-repeat
    /// on a fixed interval. Passes are serialized by construction — a slow
    /// pass delays the next one, never overlaps it — and the shutdown
    /// signal is only observed between passes, so a running pass always
    /// completes. Pass failures are logged and the loop carries on.
    pub async fn run_until_shutdown(
        &self,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        log::info!("sync scheduler starting, interval {}s", interval.as_secs());
        loop {
            if *shutdown_rx.borrow() {
                log::info!("sync scheduler stopping");
                return Ok(());
            }

            match self.reconciler.run_pass().await {
                Ok(summary) => log::info!("scheduled pass complete: {summary}"),
                Err(err) => log::error!("scheduled pass failed: {err}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        log::info!("sync scheduler stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}
