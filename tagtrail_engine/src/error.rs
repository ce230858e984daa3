use tagtrail_core::ids::UserId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] tagtrail_store::StoreError),

    #[error("provider error: {0}")]
    Provider(#[from] tagtrail_citytag::CityTagError),

    #[error("no credential registered for user '{0}'")]
    UnknownUser(UserId),

    #[error("no provider session held for user '{0}'")]
    MissingSession(UserId),
}
