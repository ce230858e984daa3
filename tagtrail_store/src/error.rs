#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("timestamp {0} is outside the representable epoch-millisecond range")]
    InvalidEpochMillis(i64),

    #[error("account id {0} does not fit into sqlite INTEGER")]
    AccountIdOverflow(u64),

    #[error("account id {0} is negative in sqlite record")]
    NegativeAccountId(i64),

    #[error("no credential registered for user '{0}'")]
    UnknownUser(String),
}
