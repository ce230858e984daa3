use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tagtrail_citytag::{CityTagApi, CityTagError, CityTagResult, LoginData};
use tagtrail_core::{
    Credential, Device, Timestamp,
    ids::{AccountId, DeviceSerial, UserId},
};

/// A provider client that replays scripted responses in order. Each call
/// pops its queue; an exhausted queue answers with a transient error, the
/// same way an unreachable provider would.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    logins: Mutex<VecDeque<CityTagResult<LoginData>>>,
    device_lists: Mutex<VecDeque<CityTagResult<Vec<Device>>>>,
    histories: Mutex<VecDeque<CityTagResult<Vec<Value>>>>,
    latest: Mutex<VecDeque<CityTagResult<Option<Value>>>>,
    login_calls: Mutex<u32>,
}

impl ScriptedClient {
    pub fn push_login(&self, result: CityTagResult<LoginData>) {
        self.inner.logins.lock().expect("logins lock").push_back(result);
    }

    pub fn push_devices(&self, result: CityTagResult<Vec<Device>>) {
        self.inner
            .device_lists
            .lock()
            .expect("device lists lock")
            .push_back(result);
    }

    pub fn push_history(&self, result: CityTagResult<Vec<Value>>) {
        self.inner
            .histories
            .lock()
            .expect("histories lock")
            .push_back(result);
    }

    pub fn push_latest(&self, result: CityTagResult<Option<Value>>) {
        self.inner.latest.lock().expect("latest lock").push_back(result);
    }

    pub fn login_calls(&self) -> u32 {
        *self.inner.login_calls.lock().expect("login calls lock")
    }
}

#[async_trait]
impl CityTagApi for ScriptedClient {
    async fn login(&self, _identifier: &str, _secret: &str) -> CityTagResult<LoginData> {
        *self.inner.login_calls.lock().expect("login calls lock") += 1;
        self.inner
            .logins
            .lock()
            .expect("logins lock")
            .pop_front()
            .unwrap_or_else(|| Err(CityTagError::message("no scripted response")))
    }

    async fn list_devices(&self, _account: AccountId, _token: &str) -> CityTagResult<Vec<Device>> {
        self.inner
            .device_lists
            .lock()
            .expect("device lists lock")
            .pop_front()
            .unwrap_or_else(|| Err(CityTagError::message("no scripted response")))
    }

    async fn latest_location(
        &self,
        _account: AccountId,
        _token: &str,
        _serial: &DeviceSerial,
    ) -> CityTagResult<Option<Value>> {
        self.inner
            .latest
            .lock()
            .expect("latest lock")
            .pop_front()
            .unwrap_or_else(|| Err(CityTagError::message("no scripted response")))
    }

    async fn location_history(
        &self,
        _account: AccountId,
        _token: &str,
        _serial: &DeviceSerial,
        _start: Timestamp,
        _end: Timestamp,
    ) -> CityTagResult<Vec<Value>> {
        self.inner
            .histories
            .lock()
            .expect("histories lock")
            .pop_front()
            .unwrap_or_else(|| Err(CityTagError::message("no scripted response")))
    }
}

pub fn credential(user: &str, account: u64) -> Credential {
    Credential {
        user_id: UserId(user.to_owned()),
        login_identifier: format!("{user}@example.com"),
        secret: "hunter2".to_owned(),
        account_id: AccountId(account),
    }
}

pub fn device(serial: &str) -> Device {
    Device {
        serial: DeviceSerial(serial.to_owned()),
        metadata: json!({"sn": serial}),
    }
}

pub fn login_data(token: &str) -> LoginData {
    LoginData {
        token: token.to_owned(),
        extra: json!({"token": token}),
    }
}

pub fn raw_point(epoch_secs: i64, latitude: f64, longitude: f64) -> Value {
    json!({"gpstime": epoch_secs, "lat": latitude, "lng": longitude})
}

pub fn ts(epoch_secs: i64) -> Timestamp {
    Timestamp::from_epoch_secs(epoch_secs).expect("valid epoch seconds")
}
