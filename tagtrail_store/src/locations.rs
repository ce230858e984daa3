use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use tagtrail_core::{
    LocationPoint, LocationSink, Timestamp,
    ids::{DeviceSerial, UserId},
    normalize_history_item,
};

use crate::StoreError;

/// Idempotent persistence and time-ranged retrieval of location points,
/// keyed by (user, device serial, timestamp).
#[derive(Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

impl LocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Normalize one raw provider history item and upsert it. Records that
    /// fail validation (zero-sentinel coordinates, empty serial) are
    /// skipped with a debug log and report `false`; otherwise `true` only
    /// when the write created a row or changed its coordinates.
    pub async fn upsert_from_raw(
        &self,
        raw: &Value,
        user_id: &UserId,
        serial: &DeviceSerial,
    ) -> Result<bool, StoreError> {
        let point = match normalize_history_item(raw, user_id, serial, Timestamp::now()) {
            Ok(point) => point,
            Err(rejection) => {
                log::debug!("rejecting history item for {user_id}/{serial}: {rejection}");
                return Ok(false);
            }
        };

        self.upsert_point(&point).await
    }

    pub async fn upsert_point(&self, point: &LocationPoint) -> Result<bool, StoreError> {
        // The WHERE guard keeps re-confirmations from counting as writes:
        // an upsert of identical coordinates affects zero rows.
        let result = sqlx::query(
            r#"
            INSERT INTO location_log (user_id, serial, timestamp_epoch_millis, latitude, longitude)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, serial, timestamp_epoch_millis) DO UPDATE
            SET latitude = excluded.latitude,
                longitude = excluded.longitude
            WHERE location_log.latitude IS NOT excluded.latitude
               OR location_log.longitude IS NOT excluded.longitude
            "#,
        )
        .bind(point.user_id.as_str())
        .bind(point.serial.as_str())
        .bind(point.timestamp.as_epoch_millis())
        .bind(point.latitude)
        .bind(point.longitude)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Read points for one device in ascending timestamp order, bounds
    /// inclusive.
    pub async fn query(
        &self,
        user_id: &UserId,
        serial: &DeviceSerial,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<LocationPoint>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbLocationRow>(
            r#"
            SELECT user_id, serial, timestamp_epoch_millis, latitude, longitude
            FROM location_log
            WHERE user_id = ?1
              AND serial = ?2
              AND timestamp_epoch_millis BETWEEN ?3 AND ?4
            ORDER BY timestamp_epoch_millis ASC
            "#,
        )
        .bind(user_id.as_str())
        .bind(serial.as_str())
        .bind(start.as_epoch_millis())
        .bind(end.as_epoch_millis())
        .fetch(&self.pool);

        let mut points = Vec::new();
        while let Some(row) = rows.try_next().await? {
            points.push(LocationPoint::try_from(row)?);
        }

        Ok(points)
    }
}

#[async_trait]
impl LocationSink for LocationStore {
    type Error = StoreError;

    async fn upsert_raw(
        &self,
        raw: &Value,
        user_id: &UserId,
        serial: &DeviceSerial,
    ) -> Result<bool, Self::Error> {
        self.upsert_from_raw(raw, user_id, serial).await
    }
}

#[derive(Debug, FromRow)]
struct DbLocationRow {
    user_id: String,
    serial: String,
    timestamp_epoch_millis: i64,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<DbLocationRow> for LocationPoint {
    type Error = StoreError;

    fn try_from(value: DbLocationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId(value.user_id),
            serial: DeviceSerial(value.serial),
            timestamp: Timestamp::from_epoch_millis(value.timestamp_epoch_millis)
                .ok_or(StoreError::InvalidEpochMillis(value.timestamp_epoch_millis))?,
            latitude: value.latitude,
            longitude: value.longitude,
        })
    }
}
