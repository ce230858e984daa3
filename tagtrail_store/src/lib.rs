mod error;
mod locations;
mod sessions;

use std::{path::Path, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

pub use error::StoreError;
pub use locations::LocationStore;
pub use sessions::SessionStore;

/// Open (creating if missing) the tagtrail database and apply migrations.
/// Both stores share the returned pool.
pub async fn connect(database_path: impl AsRef<Path>) -> Result<SqlitePool, StoreError> {
    let connect_options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}
