pub mod client;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod failure;
pub mod reconciler;

pub use client::{CityTagApi, HttpCityTagClient, LoginData};
pub use config::CityTagConfig;
pub use errors::{CityTagError, CityTagResult};
pub use failure::{FailureKind, classify_failure};
pub use reconciler::{Clock, PassSummary, ReconcilerConfig, SyncReconciler, SystemClock};
