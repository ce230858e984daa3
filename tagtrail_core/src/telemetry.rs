use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::{
    ids::{DeviceSerial, UserId},
    time::Timestamp,
};

/// Candidate field names for the record timestamp, first present wins.
const TIMESTAMP_KEYS: &[&str] = &["gpstime", "time", "timestamp"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lng", "lon", "longitude"];

/// Numeric timestamps above this are epoch-milliseconds, below are seconds.
const EPOCH_MILLIS_BOUNDARY: f64 = 1e10;

/// A device as reported by the provider's fleet listing. Never persisted;
/// fetched fresh on every reconciliation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    pub serial: DeviceSerial,
    pub metadata: Value,
}

/// A normalized GPS fix. The (user_id, serial, timestamp) triple is the
/// deduplication key.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationPoint {
    pub user_id: UserId,
    pub serial: DeviceSerial,
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a raw history item was refused. Rejected records are skipped, never
/// stored, and never abort a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RawRejection {
    #[error("latitude or longitude resolved to the zero sentinel")]
    ZeroCoordinate,
    #[error("record has no device serial")]
    EmptySerial,
}

#[async_trait]
pub trait LocationSink {
    type Error: Send + Sync + 'static;

    /// Normalize and idempotently persist one raw history item. Returns
    /// true only when the write created a record or changed its fields.
    async fn upsert_raw(
        &self,
        raw: &Value,
        user_id: &UserId,
        serial: &DeviceSerial,
    ) -> Result<bool, Self::Error>;
}

/// Normalize one raw history item into a [`LocationPoint`].
///
/// The provider is inconsistent about field names, so each of timestamp,
/// latitude and longitude is resolved from a fixed candidate list; a
/// candidate only counts when its value is non-null, non-zero and
/// non-empty, so a zero `lat` still falls through to `latitude`. A record
/// whose serial is empty (after falling back to the item's own `sn` field)
/// or whose coordinates resolve to the 0.0 sentinel is rejected.
pub fn normalize_history_item(
    raw: &Value,
    user_id: &UserId,
    serial: &DeviceSerial,
    fallback_now: Timestamp,
) -> Result<LocationPoint, RawRejection> {
    let serial = if serial.is_empty() {
        raw.get("sn")
            .and_then(Value::as_str)
            .map(|sn| DeviceSerial(sn.to_owned()))
            .unwrap_or_else(|| serial.clone())
    } else {
        serial.clone()
    };
    if serial.is_empty() {
        return Err(RawRejection::EmptySerial);
    }

    let latitude = coordinate(raw, LATITUDE_KEYS);
    let longitude = coordinate(raw, LONGITUDE_KEYS);
    if latitude == 0.0 || longitude == 0.0 {
        return Err(RawRejection::ZeroCoordinate);
    }

    let timestamp = parse_provider_timestamp(first_meaningful(raw, TIMESTAMP_KEYS), fallback_now);

    Ok(LocationPoint {
        user_id: user_id.clone(),
        serial,
        timestamp,
        latitude,
        longitude,
    })
}

/// Interpret a provider timestamp value.
///
/// Numbers above 1e10 are epoch-milliseconds, otherwise epoch-seconds
/// (fractional seconds are kept). Strings are ISO-8601, with or without an
/// offset; a trailing `Z` reads as UTC. Anything else falls back to the
/// supplied instant — a lossy fallback that can misplace a point in time
/// if the upstream format drifts, kept deliberately.
pub fn parse_provider_timestamp(value: Option<&Value>, fallback: Timestamp) -> Timestamp {
    match value {
        Some(Value::Number(number)) => match number.as_f64() {
            Some(raw) if raw > EPOCH_MILLIS_BOUNDARY => {
                Timestamp::from_epoch_millis(raw as i64).unwrap_or(fallback)
            }
            Some(raw) => Timestamp::from_epoch_millis((raw * 1000.0) as i64).unwrap_or(fallback),
            None => fallback,
        },
        Some(Value::String(raw)) => parse_iso8601(raw).unwrap_or(fallback),
        _ => fallback,
    }
}

fn parse_iso8601(raw: &str) -> Option<Timestamp> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Timestamp::from_epoch_millis(parsed.timestamp_millis());
    }

    // The provider sometimes omits the offset entirely; read those as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Timestamp::from_epoch_millis(naive.and_utc().timestamp_millis()))
}

fn first_meaningful<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| is_meaningful(value))
}

fn coordinate(raw: &Value, keys: &[&str]) -> f64 {
    match first_meaningful(raw, keys) {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|raw| raw != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RawRejection, normalize_history_item, parse_provider_timestamp};
    use crate::{
        ids::{DeviceSerial, UserId},
        time::Timestamp,
    };

    fn user() -> UserId {
        UserId("user-1".to_owned())
    }

    fn serial() -> DeviceSerial {
        DeviceSerial("SN-100".to_owned())
    }

    fn fallback() -> Timestamp {
        Timestamp::from_epoch_secs(1_800_000_000).expect("valid epoch seconds")
    }

    #[test]
    fn seconds_and_milliseconds_parse_to_the_same_instant() {
        let secs = parse_provider_timestamp(Some(&json!(1_700_000_000)), fallback());
        let millis = parse_provider_timestamp(Some(&json!(1_700_000_000_000_i64)), fallback());
        assert_eq!(secs, millis);
        assert_eq!(secs.as_epoch_secs(), 1_700_000_000);
    }

    #[test]
    fn millis_classification_boundary_is_1e10() {
        // 1e10 itself is still seconds; one more is milliseconds.
        let below = parse_provider_timestamp(Some(&json!(10_000_000_000_i64)), fallback());
        assert_eq!(below.as_epoch_secs(), 10_000_000_000);

        let above = parse_provider_timestamp(Some(&json!(10_000_000_001_i64)), fallback());
        assert_eq!(above.as_epoch_millis(), 10_000_000_001);
    }

    #[test]
    fn iso8601_strings_parse_with_and_without_offset() {
        let zulu = parse_provider_timestamp(Some(&json!("2023-11-14T22:13:20Z")), fallback());
        assert_eq!(zulu.as_epoch_secs(), 1_700_000_000);

        let offset = parse_provider_timestamp(Some(&json!("2023-11-14T22:13:20+00:00")), fallback());
        assert_eq!(offset, zulu);

        let naive = parse_provider_timestamp(Some(&json!("2023-11-14T22:13:20")), fallback());
        assert_eq!(naive, zulu);
    }

    #[test]
    fn unparseable_timestamps_fall_back_to_now() {
        assert_eq!(
            parse_provider_timestamp(Some(&json!("not a date")), fallback()),
            fallback()
        );
        assert_eq!(parse_provider_timestamp(Some(&json!(null)), fallback()), fallback());
        assert_eq!(parse_provider_timestamp(None, fallback()), fallback());
        assert_eq!(
            parse_provider_timestamp(Some(&json!({"nested": 1})), fallback()),
            fallback()
        );
    }

    #[test]
    fn normalizes_a_well_formed_item() {
        let raw = json!({
            "gpstime": 1_700_000_000,
            "lat": 31.2304,
            "lng": 121.4737,
            "speed": 4.2,
        });

        let point = normalize_history_item(&raw, &user(), &serial(), fallback())
            .expect("item should normalize");
        assert_eq!(point.user_id, user());
        assert_eq!(point.serial, serial());
        assert_eq!(point.timestamp.as_epoch_secs(), 1_700_000_000);
        assert_eq!(point.latitude, 31.2304);
        assert_eq!(point.longitude, 121.4737);
    }

    #[test]
    fn alternate_field_names_are_accepted() {
        let raw = json!({
            "timestamp": "2023-11-14T22:13:20Z",
            "latitude": "31.5",
            "lon": "121.25",
        });

        let point = normalize_history_item(&raw, &user(), &serial(), fallback())
            .expect("item should normalize");
        assert_eq!(point.timestamp.as_epoch_secs(), 1_700_000_000);
        assert_eq!(point.latitude, 31.5);
        assert_eq!(point.longitude, 121.25);
    }

    #[test]
    fn zero_coordinate_candidates_fall_through_to_the_next_key() {
        let raw = json!({
            "time": 1_700_000_000,
            "lat": 0,
            "latitude": 31.2,
            "lng": 121.4,
        });

        let point = normalize_history_item(&raw, &user(), &serial(), fallback())
            .expect("item should normalize");
        assert_eq!(point.latitude, 31.2);
    }

    #[test]
    fn zero_coordinates_are_rejected() {
        let raw = json!({"time": 1_700_000_000, "lat": 0.0, "lng": 121.4});
        assert_eq!(
            normalize_history_item(&raw, &user(), &serial(), fallback()),
            Err(RawRejection::ZeroCoordinate)
        );

        let raw = json!({"time": 1_700_000_000, "lat": 31.2, "lng": 0});
        assert_eq!(
            normalize_history_item(&raw, &user(), &serial(), fallback()),
            Err(RawRejection::ZeroCoordinate)
        );
    }

    #[test]
    fn missing_coordinates_are_rejected() {
        let raw = json!({"time": 1_700_000_000});
        assert_eq!(
            normalize_history_item(&raw, &user(), &serial(), fallback()),
            Err(RawRejection::ZeroCoordinate)
        );
    }

    #[test]
    fn empty_serial_falls_back_to_the_item_sn_field() {
        let raw = json!({"time": 1_700_000_000, "lat": 31.2, "lng": 121.4, "sn": "SN-FROM-ITEM"});
        let point = normalize_history_item(&raw, &user(), &DeviceSerial(String::new()), fallback())
            .expect("item should normalize via its own sn");
        assert_eq!(point.serial, DeviceSerial("SN-FROM-ITEM".to_owned()));
    }

    #[test]
    fn empty_serial_without_fallback_is_rejected() {
        let raw = json!({"time": 1_700_000_000, "lat": 31.2, "lng": 121.4});
        assert_eq!(
            normalize_history_item(&raw, &user(), &DeviceSerial(String::new()), fallback()),
            Err(RawRejection::EmptySerial)
        );
    }

    #[test]
    fn unparseable_coordinate_strings_read_as_zero_and_reject() {
        let raw = json!({"time": 1_700_000_000, "lat": "not a float", "lng": 121.4});
        assert_eq!(
            normalize_history_item(&raw, &user(), &serial(), fallback()),
            Err(RawRejection::ZeroCoordinate)
        );
    }
}
