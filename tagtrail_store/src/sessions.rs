use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::{FromRow, SqlitePool};
use tagtrail_core::{
    Credential, ProviderSession, SessionRegistry, Timestamp,
    ids::{AccountId, UserId},
};

use crate::StoreError;

/// Credential rows plus the provider session token currently held for each
/// user. The token column is a last-write-wins single-row update: a race
/// between an interactive login and the reconciler's re-login leaves
/// either token active, and both are valid provider sessions.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create or replace a user's login material. The stored token is left
    /// untouched so a credential refresh does not force a re-login.
    pub async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let account_id = account_id_to_sqlite(credential.account_id)?;
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, login_identifier, secret, account_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id) DO UPDATE
            SET login_identifier = excluded.login_identifier,
                secret = excluded.secret,
                account_id = excluded.account_id
            "#,
        )
        .bind(credential.user_id.as_str())
        .bind(&credential.login_identifier)
        .bind(&credential.secret)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_credential(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, DbCredentialRow>(
            r#"
            SELECT user_id, login_identifier, secret, account_id
            FROM credentials
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Credential::try_from).transpose()
    }

    pub async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbCredentialRow>(
            r#"
            SELECT user_id, login_identifier, secret, account_id
            FROM credentials
            ORDER BY user_id ASC
            "#,
        )
        .fetch(&self.pool);

        let mut credentials = Vec::new();
        while let Some(row) = rows.try_next().await? {
            credentials.push(Credential::try_from(row)?);
        }

        Ok(credentials)
    }

    pub async fn load_session(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ProviderSession>, StoreError> {
        let row = sqlx::query_as::<_, DbSessionRow>(
            r#"
            SELECT user_id, token, token_obtained_at_epoch_millis
            FROM credentials
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(DbSessionRow {
                user_id,
                token: Some(token),
                token_obtained_at_epoch_millis: Some(obtained_at),
            }) => Ok(Some(ProviderSession {
                user_id: UserId(user_id),
                token,
                obtained_at: Timestamp::from_epoch_millis(obtained_at)
                    .ok_or(StoreError::InvalidEpochMillis(obtained_at))?,
            })),
            _ => Ok(None),
        }
    }

    pub async fn save_session(&self, session: &ProviderSession) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET token = ?2, token_obtained_at_epoch_millis = ?3
            WHERE user_id = ?1
            "#,
        )
        .bind(session.user_id.as_str())
        .bind(&session.token)
        .bind(session.obtained_at.as_epoch_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownUser(session.user_id.as_str().to_owned()));
        }
        Ok(())
    }

    pub async fn clear_session(&self, user_id: &UserId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE credentials
            SET token = NULL, token_obtained_at_epoch_millis = NULL
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionRegistry for SessionStore {
    type Error = StoreError;

    async fn upsert_credential(&self, credential: &Credential) -> Result<(), Self::Error> {
        SessionStore::upsert_credential(self, credential).await
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, Self::Error> {
        SessionStore::list_credentials(self).await
    }

    async fn load_session(&self, user_id: &UserId) -> Result<Option<ProviderSession>, Self::Error> {
        SessionStore::load_session(self, user_id).await
    }

    async fn save_session(&self, session: &ProviderSession) -> Result<(), Self::Error> {
        SessionStore::save_session(self, session).await
    }

    async fn clear_session(&self, user_id: &UserId) -> Result<(), Self::Error> {
        SessionStore::clear_session(self, user_id).await
    }
}

#[derive(Debug, FromRow)]
struct DbCredentialRow {
    user_id: String,
    login_identifier: String,
    secret: String,
    account_id: i64,
}

#[derive(Debug, FromRow)]
struct DbSessionRow {
    user_id: String,
    token: Option<String>,
    token_obtained_at_epoch_millis: Option<i64>,
}

impl TryFrom<DbCredentialRow> for Credential {
    type Error = StoreError;

    fn try_from(value: DbCredentialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId(value.user_id),
            login_identifier: value.login_identifier,
            secret: value.secret,
            account_id: account_id_from_sqlite(value.account_id)?,
        })
    }
}

fn account_id_to_sqlite(account_id: AccountId) -> Result<i64, StoreError> {
    i64::try_from(account_id.0).map_err(|_| StoreError::AccountIdOverflow(account_id.0))
}

fn account_id_from_sqlite(raw: i64) -> Result<AccountId, StoreError> {
    let value = u64::try_from(raw).map_err(|_| StoreError::NegativeAccountId(raw))?;
    Ok(AccountId(value))
}
