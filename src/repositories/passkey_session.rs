//! Passkey ceremony session store
//!
//! TTL-bounded map of in-flight WebAuthn ceremony sessions, keyed by a
//! generated session token. One-shot: the service deletes the session
//! after the finish leg regardless of outcome. `retrieve_session` never
//! returns an expired row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::models::PasskeySessionData;

/// A retrieved session: the ceremony data plus the user and relying
/// party it was issued for.
pub struct RetrievedSession {
    pub data: PasskeySessionData,
    pub user_id: String,
    pub relying_party_id: String,
}

#[async_trait]
pub trait PasskeySessionStore: Send + Sync {
    async fn store_session(
        &self,
        key: &str,
        user_id: &str,
        relying_party_id: &str,
        data: &PasskeySessionData,
        expiry_time: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn retrieve_session(&self, key: &str) -> Result<Option<RetrievedSession>, StoreError>;

    async fn delete_session(&self, key: &str) -> Result<(), StoreError>;

    async fn delete_expired_sessions(&self) -> Result<u64, StoreError>;
}

/// Database-backed store (the production variant).
pub struct SqlPasskeySessionStore {
    pool: MySqlPool,
}

#[derive(FromRow)]
struct SessionRow {
    user_id: String,
    rp_id: String,
    data: serde_json::Value,
}

impl SqlPasskeySessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasskeySessionStore for SqlPasskeySessionStore {
    async fn store_session(
        &self,
        key: &str,
        user_id: &str,
        relying_party_id: &str,
        data: &PasskeySessionData,
        expiry_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(data)?;

        sqlx::query(
            r#"
            INSERT INTO PASSKEY_SESSION (SESSION_KEY, USER_ID, RP_ID, DATA, EXPIRY_TIME)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(user_id)
        .bind(relying_party_id)
        .bind(&encoded)
        .bind(expiry_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn retrieve_session(&self, key: &str) -> Result<Option<RetrievedSession>, StoreError> {
        if key.is_empty() {
            return Ok(None);
        }

        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT USER_ID AS user_id, RP_ID AS rp_id, DATA AS data
            FROM PASSKEY_SESSION
            WHERE SESSION_KEY = ? AND EXPIRY_TIME > ?
            "#,
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(RetrievedSession {
                data: serde_json::from_value(row.data)?,
                user_id: row.user_id,
                relying_party_id: row.rp_id,
            })),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM PASSKEY_SESSION WHERE SESSION_KEY = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM PASSKEY_SESSION WHERE EXPIRY_TIME < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

struct MemorySession {
    user_id: String,
    relying_party_id: String,
    data: PasskeySessionData,
    expiry_time: DateTime<Utc>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryPasskeySessionStore {
    sessions: RwLock<HashMap<String, MemorySession>>,
}

impl MemoryPasskeySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasskeySessionStore for MemoryPasskeySessionStore {
    async fn store_session(
        &self,
        key: &str,
        user_id: &str,
        relying_party_id: &str,
        data: &PasskeySessionData,
        expiry_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        sessions.insert(
            key.to_string(),
            MemorySession {
                user_id: user_id.to_string(),
                relying_party_id: relying_party_id.to_string(),
                data: data.clone(),
                expiry_time,
            },
        );
        Ok(())
    }

    async fn retrieve_session(&self, key: &str) -> Result<Option<RetrievedSession>, StoreError> {
        if key.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let expired = {
            let sessions = self.sessions.read().expect("session store lock poisoned");
            match sessions.get(key) {
                Some(session) if session.expiry_time > now => {
                    return Ok(Some(RetrievedSession {
                        data: session.data.clone(),
                        user_id: session.user_id.clone(),
                        relying_party_id: session.relying_party_id.clone(),
                    }))
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut sessions = self.sessions.write().expect("session store lock poisoned");
            sessions.remove(key);
        }

        Ok(None)
    }

    async fn delete_session(&self, key: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        sessions.remove(key);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, session| session.expiry_time > now);
        Ok((before - sessions.len()) as u64)
    }
}
