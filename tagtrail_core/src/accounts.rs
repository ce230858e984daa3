use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{AccountId, UserId},
    time::Timestamp,
};

/// Provider login material for one registered user. Owned by the user
/// registry; the sync engine only reads it, except when an interactive
/// login replaces the whole row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub user_id: UserId,
    pub login_identifier: String,
    pub secret: String,
    pub account_id: AccountId,
}

/// The provider session currently held for a user. One per user,
/// overwritten on every successful (re-)login. There is no expiry field:
/// expiry is discovered reactively from provider error responses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSession {
    pub user_id: UserId,
    pub token: String,
    pub obtained_at: Timestamp,
}

#[async_trait]
pub trait SessionRegistry {
    type Error: Send + Sync + 'static;

    async fn upsert_credential(&self, credential: &Credential) -> Result<(), Self::Error>;

    async fn list_credentials(&self) -> Result<Vec<Credential>, Self::Error>;

    async fn load_session(&self, user_id: &UserId) -> Result<Option<ProviderSession>, Self::Error>;

    /// Last-write-wins single-row update; concurrent writers both produce
    /// valid provider sessions, so the race is left unguarded.
    async fn save_session(&self, session: &ProviderSession) -> Result<(), Self::Error>;

    async fn clear_session(&self, user_id: &UserId) -> Result<(), Self::Error>;
}
