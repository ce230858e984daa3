mod engine;
mod error;
mod queries;

pub use engine::{DEFAULT_SYNC_INTERVAL, FULL_SYNC_WINDOW, SyncEngine};
pub use error::EngineError;
pub use queries::{Playback, PlaybackPoint, Trajectory};
pub use tagtrail_citytag::PassSummary;
