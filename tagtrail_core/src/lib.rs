pub mod accounts;
pub mod ids;
pub mod telemetry;
pub mod time;

pub use accounts::{Credential, ProviderSession, SessionRegistry};
pub use ids::{AccountId, DeviceSerial, UserId};
pub use telemetry::{
    Device, LocationPoint, LocationSink, RawRejection, normalize_history_item,
    parse_provider_timestamp,
};
pub use time::Timestamp;
