use serde::Serialize;
use tagtrail_core::{LocationPoint, Timestamp, ids::DeviceSerial};

/// A device track over a time range, in GeoJSON coordinate order
/// (`[longitude, latitude]`), ready to become a LineString feature.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Trajectory {
    pub coordinates: Vec<[f64; 2]>,
    pub count: usize,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub device_serial: DeviceSerial,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlaybackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
}

/// Ordered points for animated playback of a device's movement.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Playback {
    pub points: Vec<PlaybackPoint>,
    pub count: usize,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub device_serial: DeviceSerial,
    pub duration_seconds: f64,
}

impl Trajectory {
    pub(crate) fn from_points(
        points: &[LocationPoint],
        device_serial: DeviceSerial,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        Some(Self {
            coordinates: points
                .iter()
                .map(|point| [point.longitude, point.latitude])
                .collect(),
            count: points.len(),
            start_time,
            end_time,
            device_serial,
        })
    }
}

impl Playback {
    pub(crate) fn from_points(
        points: &[LocationPoint],
        device_serial: DeviceSerial,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let duration_seconds = end_time.signed_duration_since(start_time).num_milliseconds() as f64 / 1000.0;

        Some(Self {
            points: points
                .iter()
                .map(|point| PlaybackPoint {
                    latitude: point.latitude,
                    longitude: point.longitude,
                    timestamp: point.timestamp,
                })
                .collect(),
            count: points.len(),
            start_time,
            end_time,
            device_serial,
            duration_seconds,
        })
    }
}
