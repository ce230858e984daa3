use std::{fmt, time::Duration};

use tagtrail_core::{
    Credential, Device, LocationSink, ProviderSession, SessionRegistry, Timestamp,
};

use crate::{
    CityTagApi, CityTagError, CityTagResult,
    failure::{FailureKind, classify_failure},
};

pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Trailing window fetched per device on a periodic pass.
    pub history_window: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            history_window: Duration::from_secs(15 * 60),
        }
    }
}

/// Counters for one complete sweep over all known users.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub users_processed: u32,
    pub re_logins: u32,
    pub devices_processed: u32,
    pub points_written: u32,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} re_logins={} devices={} points={}",
            self.users_processed, self.re_logins, self.devices_processed, self.points_written
        )
    }
}

/// The sync engine's orchestration core.
///
/// One pass sweeps every registered credential: ensure a valid provider
/// session (re-authenticating at most once), list the user's devices, pull
/// each device's trailing history window, and feed the raw items through
/// the location sink. Failures never escape a pass — a device failure
/// skips the device, a user failure skips the user, and the caller's
/// schedule continues regardless.
pub struct SyncReconciler<C, R, S, T = SystemClock>
where
    C: CityTagApi + Send + Sync,
    R: SessionRegistry + Send + Sync,
    <R as SessionRegistry>::Error: fmt::Display,
    S: LocationSink + Send + Sync,
    <S as LocationSink>::Error: fmt::Display,
    T: Clock + Send + Sync,
{
    client: C,
    registry: R,
    sink: S,
    clock: T,
    config: ReconcilerConfig,
}

impl<C, R, S> SyncReconciler<C, R, S, SystemClock>
where
    C: CityTagApi + Send + Sync,
    R: SessionRegistry + Send + Sync,
    <R as SessionRegistry>::Error: fmt::Display,
    S: LocationSink + Send + Sync,
    <S as LocationSink>::Error: fmt::Display,
{
    pub fn new(client: C, registry: R, sink: S, config: ReconcilerConfig) -> Self {
        Self::with_clock(client, registry, sink, config, SystemClock)
    }
}

impl<C, R, S, T> SyncReconciler<C, R, S, T>
where
    C: CityTagApi + Send + Sync,
    R: SessionRegistry + Send + Sync,
    <R as SessionRegistry>::Error: fmt::Display,
    S: LocationSink + Send + Sync,
    <S as LocationSink>::Error: fmt::Display,
    T: Clock + Send + Sync,
{
    pub fn with_clock(client: C, registry: R, sink: S, config: ReconcilerConfig, clock: T) -> Self {
        Self {
            client,
            registry,
            sink,
            clock,
            config,
        }
    }

    pub async fn run_pass(&self) -> CityTagResult<PassSummary> {
        self.run_pass_with_window(self.config.history_window).await
    }

    /// Run one pass with an explicit trailing window. Errors only when the
    /// credential registry itself cannot be enumerated; everything past
    /// that point is contained per user or per device.
    pub async fn run_pass_with_window(&self, window: Duration) -> CityTagResult<PassSummary> {
        let credentials = self.registry.list_credentials().await.map_err(|err| {
            CityTagError::message(format!("failed to enumerate credentials: {err}"))
        })?;

        log::info!("reconciliation pass starting for {} users", credentials.len());
        let mut summary = PassSummary::default();
        for credential in &credentials {
            summary.users_processed += 1;
            self.sync_user(credential, window, &mut summary).await;
        }

        log::info!("reconciliation pass complete: {summary}");
        Ok(summary)
    }

    /// Log into the provider with `credential` and persist the fresh
    /// session. Shared by the reconciler's re-login branch and the
    /// dashboard's interactive login.
    pub async fn authenticate(&self, credential: &Credential) -> CityTagResult<ProviderSession> {
        let login = self
            .client
            .login(&credential.login_identifier, &credential.secret)
            .await?;

        let session = ProviderSession {
            user_id: credential.user_id.clone(),
            token: login.token,
            obtained_at: self.clock.now(),
        };
        self.registry.save_session(&session).await.map_err(|err| {
            CityTagError::message(format!(
                "failed to persist session for {}: {err}",
                credential.user_id
            ))
        })?;

        log::info!("login succeeded for {}; session stored", credential.user_id);
        Ok(session)
    }

    async fn sync_user(&self, credential: &Credential, window: Duration, summary: &mut PassSummary) {
        let user = &credential.user_id;
        let stored = match self.registry.load_session(user).await {
            Ok(stored) => stored,
            Err(err) => {
                log::error!("failed to load session for {user}: {err}");
                return;
            }
        };

        let Some((token, devices)) = self.acquire_devices(credential, stored, summary).await else {
            return;
        };

        if devices.is_empty() {
            log::debug!("no devices listed for {user}");
            return;
        }
        summary.devices_processed += devices.len() as u32;

        let end = self.clock.now();
        let start = end.checked_sub(window).unwrap_or(end);
        for device in &devices {
            self.poll_device(credential, &token, device, start, end, summary)
                .await;
        }
    }

    /// Per-user token state machine: use the stored session when device
    /// listing accepts it; when the token is missing or auth-rejected,
    /// re-login and retry the listing exactly once.
    async fn acquire_devices(
        &self,
        credential: &Credential,
        stored: Option<ProviderSession>,
        summary: &mut PassSummary,
    ) -> Option<(String, Vec<Device>)> {
        let user = &credential.user_id;

        if let Some(session) = stored {
            match self.fetch_devices(credential, &session.token).await {
                DeviceFetch::Listed(devices) => return Some((session.token, devices)),
                DeviceFetch::Failed(err) => {
                    log::error!(
                        "non-auth failure listing devices for {user}: {:?}",
                        err.display_chain()
                    );
                    return None;
                }
                DeviceFetch::AuthRejected(err) => {
                    log::warn!("session rejected for {user} ({err}); re-login triggered");
                }
            }
        } else {
            log::debug!("no stored session for {user}; login required");
        }

        let session = match self.authenticate(credential).await {
            Ok(session) => session,
            Err(err) => {
                log::error!("re-login failed for {user}: {:?}", err.display_chain());
                return None;
            }
        };
        summary.re_logins += 1;

        match self.fetch_devices(credential, &session.token).await {
            DeviceFetch::Listed(devices) => Some((session.token, devices)),
            DeviceFetch::AuthRejected(err) | DeviceFetch::Failed(err) => {
                log::error!(
                    "device listing failed for {user} even after re-login: {:?}",
                    err.display_chain()
                );
                None
            }
        }
    }

    async fn fetch_devices(&self, credential: &Credential, token: &str) -> DeviceFetch {
        match self.client.list_devices(credential.account_id, token).await {
            Ok(devices) => DeviceFetch::Listed(devices),
            Err(err) => match classify_failure(&err) {
                FailureKind::Expired => DeviceFetch::AuthRejected(err),
                FailureKind::Transient | FailureKind::Fatal => DeviceFetch::Failed(err),
            },
        }
    }

    async fn poll_device(
        &self,
        credential: &Credential,
        token: &str,
        device: &Device,
        start: Timestamp,
        end: Timestamp,
        summary: &mut PassSummary,
    ) {
        let history = match self
            .client
            .location_history(credential.account_id, token, &device.serial, start, end)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                log::error!(
                    "history fetch failed for {} ({}): {:?}",
                    device.serial,
                    credential.user_id,
                    err.display_chain()
                );
                return;
            }
        };

        let mut written = 0u32;
        for item in &history {
            match self
                .sink
                .upsert_raw(item, &credential.user_id, &device.serial)
                .await
            {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(err) => {
                    log::error!("failed to persist point for {}: {err}", device.serial);
                }
            }
        }

        if written > 0 {
            log::debug!(
                "{written} new points for {} ({})",
                device.serial,
                credential.user_id
            );
        }
        summary.points_written += written;
    }
}

enum DeviceFetch {
    Listed(Vec<Device>),
    AuthRejected(CityTagError),
    Failed(CityTagError),
}
