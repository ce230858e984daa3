use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tagtrail_core::{
    Device, Timestamp,
    ids::{AccountId, DeviceSerial},
};

use crate::{CityTagError, CityTagResult, config::CityTagConfig, envelope};

/// CityTag's in-body success sentinel.
const SUCCESS_CODE: &str = "00000";

/// Timeout for login, device listing and latest-position calls.
const GENERAL_TIMEOUT: Duration = Duration::from_secs(15);
/// History responses are larger; give them more headroom.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(45);

const DEVICE_PAGE_SIZE: u32 = 20;
const HISTORY_PAGE_SIZE: u32 = 500;

/// What a successful login returns: the session token plus whatever else
/// the provider put in the `data` object (kept opaque).
#[derive(Clone, Debug, PartialEq)]
pub struct LoginData {
    pub token: String,
    pub extra: Value,
}

#[async_trait]
pub trait CityTagApi {
    async fn login(&self, identifier: &str, secret: &str) -> CityTagResult<LoginData>;

    async fn list_devices(&self, account: AccountId, token: &str) -> CityTagResult<Vec<Device>>;

    async fn latest_location(
        &self,
        account: AccountId,
        token: &str,
        serial: &DeviceSerial,
    ) -> CityTagResult<Option<Value>>;

    async fn location_history(
        &self,
        account: AccountId,
        token: &str,
        serial: &DeviceSerial,
        start: Timestamp,
        end: Timestamp,
    ) -> CityTagResult<Vec<Value>>;
}

/// Outer response shape shared by every CityTag endpoint. For encrypted
/// endpoints `data` is a base64 ciphertext string; for login it is a plain
/// object.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone)]
pub struct HttpCityTagClient {
    http: reqwest::Client,
    config: CityTagConfig,
}

impl HttpCityTagClient {
    pub fn new(config: CityTagConfig) -> CityTagResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    /// POST an encrypted payload and decrypt the response's `data` field.
    /// An absent or empty `data` decodes to `None`.
    async fn post_encrypted(
        &self,
        url: String,
        payload: &Value,
        token: &str,
        timeout: Duration,
        fallback_msg: &'static str,
    ) -> CityTagResult<Option<Value>> {
        let encryption = envelope::encrypt_payload(payload, token)?;
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&json!({ "encryption": encryption }))
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiEnvelope = response.json().await?;
        match unwrap_envelope(envelope, fallback_msg)? {
            Some(Value::String(ciphertext)) if !ciphertext.is_empty() => {
                Ok(Some(envelope::decrypt_payload(&ciphertext, token)?))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CityTagApi for HttpCityTagClient {
    async fn login(&self, identifier: &str, secret: &str) -> CityTagResult<LoginData> {
        let url = self.config.endpoint("api/interface/login");
        let response = self
            .http
            .post(&url)
            .timeout(GENERAL_TIMEOUT)
            .form(&[("username", identifier), ("password", secret)])
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiEnvelope = response.json().await?;
        let data = unwrap_envelope(envelope, "CityTag login failed")?.unwrap_or(Value::Null);
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or(CityTagError::MissingToken)?
            .to_owned();

        Ok(LoginData { token, extra: data })
    }

    async fn list_devices(&self, account: AccountId, token: &str) -> CityTagResult<Vec<Device>> {
        let url = self.config.endpoint(&format!("api2/v4/device/{account}"));
        let payload = json!({ "pageNo": 1, "pageSize": DEVICE_PAGE_SIZE });

        let decrypted = self
            .post_encrypted(url, &payload, token, GENERAL_TIMEOUT, "CityTag device list failed")
            .await?;
        Ok(decrypted.map(devices_from_payload).unwrap_or_default())
    }

    async fn latest_location(
        &self,
        account: AccountId,
        token: &str,
        serial: &DeviceSerial,
    ) -> CityTagResult<Option<Value>> {
        let url = self.config.endpoint(&format!("api/interface/v2/device/{account}"));
        let payload = json!({
            "uid": account.0,
            "sn": serial.as_str(),
            "pageNo": 1,
            "pageSize": DEVICE_PAGE_SIZE,
        });

        let decrypted = self
            .post_encrypted(url, &payload, token, GENERAL_TIMEOUT, "CityTag trajectory failed")
            .await?;
        Ok(decrypted.and_then(|value| history_from_payload(value).pop()))
    }

    async fn location_history(
        &self,
        account: AccountId,
        token: &str,
        serial: &DeviceSerial,
        start: Timestamp,
        end: Timestamp,
    ) -> CityTagResult<Vec<Value>> {
        let url = self.config.endpoint(&format!("api/interface/v2/device/{account}"));
        let payload = json!({
            "uid": account.0,
            "sn": serial.as_str(),
            "pageNo": 1,
            "pageSize": HISTORY_PAGE_SIZE,
            "beginTime": start.as_epoch_millis(),
            "endTime": end.as_epoch_millis(),
        });

        let decrypted = self
            .post_encrypted(
                url,
                &payload,
                token,
                HISTORY_TIMEOUT,
                "Failed to fetch location history",
            )
            .await?;
        Ok(decrypted.map(history_from_payload).unwrap_or_default())
    }
}

fn unwrap_envelope(envelope: ApiEnvelope, fallback_msg: &'static str) -> CityTagResult<Option<Value>> {
    if envelope.code != SUCCESS_CODE {
        return Err(CityTagError::Api {
            code: envelope.code,
            message: envelope
                .msg
                .filter(|msg| !msg.is_empty())
                .unwrap_or_else(|| fallback_msg.to_owned()),
        });
    }
    Ok(envelope.data)
}

/// The device listing comes back as a bare array, or as an object carrying
/// the array under `list` or `devices`, depending on provider mood. Any
/// other shape decodes to empty — a deliberate fallback for an upstream
/// contract this side cannot pin down. Entries without a usable `sn` are
/// dropped here.
fn devices_from_payload(decrypted: Value) -> Vec<Device> {
    let items = match decrypted {
        Value::Array(items) => items,
        Value::Object(mut fields) => {
            let mut found = None;
            for key in ["list", "devices"] {
                match fields.remove(key) {
                    Some(Value::Array(items)) => {
                        found = Some(items);
                        break;
                    }
                    Some(_) | None => {}
                }
            }
            match found {
                Some(items) => items,
                None => {
                    log::debug!("unrecognized device listing shape; treating as empty");
                    return Vec::new();
                }
            }
        }
        _ => {
            log::debug!("unrecognized device listing shape; treating as empty");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match item.get("sn").and_then(Value::as_str) {
            Some(sn) if !sn.is_empty() => Some(Device {
                serial: DeviceSerial(sn.to_owned()),
                metadata: item,
            }),
            _ => {
                log::debug!("dropping device entry without a serial number");
                None
            }
        })
        .collect()
}

fn history_from_payload(decrypted: Value) -> Vec<Value> {
    match decrypted {
        Value::Object(mut fields) => match fields.remove("history") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tagtrail_core::ids::DeviceSerial;

    use super::{ApiEnvelope, devices_from_payload, history_from_payload, unwrap_envelope};
    use crate::CityTagError;

    #[test]
    fn bare_array_listing_is_accepted() {
        let devices = devices_from_payload(json!([
            {"sn": "SN-1", "name": "tracker"},
            {"sn": "SN-2"},
        ]));
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, DeviceSerial("SN-1".to_owned()));
        assert_eq!(devices[0].metadata["name"], "tracker");
    }

    #[test]
    fn listing_under_either_known_key_is_accepted() {
        let from_list = devices_from_payload(json!({"list": [{"sn": "SN-1"}]}));
        assert_eq!(from_list.len(), 1);

        let from_devices = devices_from_payload(json!({"devices": [{"sn": "SN-2"}]}));
        assert_eq!(from_devices.len(), 1);
    }

    #[test]
    fn unrecognized_listing_shapes_decode_to_empty() {
        assert!(devices_from_payload(json!({"items": [{"sn": "SN-1"}]})).is_empty());
        assert!(devices_from_payload(json!("nonsense")).is_empty());
        assert!(devices_from_payload(json!({"list": "not an array"})).is_empty());
    }

    #[test]
    fn entries_without_serials_are_dropped() {
        let devices = devices_from_payload(json!([
            {"sn": "SN-1"},
            {"name": "no serial"},
            {"sn": ""},
        ]));
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn history_is_read_from_the_history_field() {
        let history = history_from_payload(json!({"history": [{"lat": 1.0}, {"lat": 2.0}]}));
        assert_eq!(history.len(), 2);

        assert!(history_from_payload(json!({"history": null})).is_empty());
        assert!(history_from_payload(json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn non_success_codes_surface_the_body_message() {
        let envelope = ApiEnvelope {
            code: "90001".to_owned(),
            msg: Some("Token Expired".to_owned()),
            data: None,
        };
        let err = unwrap_envelope(envelope, "fallback").expect_err("must fail");
        match err {
            CityTagError::Api { code, message } => {
                assert_eq!(code, "90001");
                assert_eq!(message, "Token Expired");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_body_message_uses_the_fallback() {
        let envelope = ApiEnvelope {
            code: "90001".to_owned(),
            msg: None,
            data: None,
        };
        let err = unwrap_envelope(envelope, "CityTag login failed").expect_err("must fail");
        match err {
            CityTagError::Api { message, .. } => assert_eq!(message, "CityTag login failed"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
