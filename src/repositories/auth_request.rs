//! Auth-request context store
//!
//! One-shot, TTL-bounded persistence for in-flight authorization requests,
//! keyed by an opaque generated handle (`authId`). The store is the sole
//! source of truth for a handle's lifetime: retrieval never resurrects an
//! expired row, and a successful retrieval is paired with a clear by the
//! caller.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::OAuthParameters;

#[async_trait]
pub trait AuthRequestStore: Send + Sync {
    /// Persist the request context under a fresh handle and return it.
    /// Any error is fatal for the caller (no partial success).
    async fn add_request(&self, params: &OAuthParameters) -> Result<String, StoreError>;

    /// Look up a context by handle. Empty handles short-circuit to
    /// `Ok(None)`; missing and expired rows are indistinguishable.
    async fn get_request(&self, handle: &str) -> Result<Option<OAuthParameters>, StoreError>;

    /// Delete the context. Empty handles are a no-op; callers treat
    /// failures as best-effort and only log them.
    async fn clear_request(&self, handle: &str) -> Result<(), StoreError>;

    /// Purge expired rows. Returns the number of rows removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// Database-backed store (the production variant).
pub struct SqlAuthRequestStore {
    pool: MySqlPool,
    deployment_id: String,
    validity: Duration,
}

impl SqlAuthRequestStore {
    pub fn new(pool: MySqlPool, deployment_id: String, validity_secs: i64) -> Self {
        Self {
            pool,
            deployment_id,
            validity: Duration::seconds(validity_secs),
        }
    }
}

#[async_trait]
impl AuthRequestStore for SqlAuthRequestStore {
    async fn add_request(&self, params: &OAuthParameters) -> Result<String, StoreError> {
        let handle = Uuid::new_v4().to_string();
        let data = serde_json::to_value(params)?;
        let expiry_time = Utc::now() + self.validity;

        sqlx::query(
            r#"
            INSERT INTO AUTH_REQUEST (AUTH_ID, REQUEST_DATA, EXPIRY_TIME, DEPLOYMENT_ID)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&handle)
        .bind(&data)
        .bind(expiry_time)
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await?;

        Ok(handle)
    }

    async fn get_request(&self, handle: &str) -> Result<Option<OAuthParameters>, StoreError> {
        if handle.is_empty() {
            return Ok(None);
        }

        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT REQUEST_DATA
            FROM AUTH_REQUEST
            WHERE AUTH_ID = ? AND DEPLOYMENT_ID = ? AND EXPIRY_TIME > ?
            "#,
        )
        .bind(handle)
        .bind(&self.deployment_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            // The lenient scope decode inside OAuthParameters keeps a
            // type-mismatched scope array from failing the whole row.
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn clear_request(&self, handle: &str) -> Result<(), StoreError> {
        if handle.is_empty() {
            return Ok(());
        }

        sqlx::query("DELETE FROM AUTH_REQUEST WHERE AUTH_ID = ? AND DEPLOYMENT_ID = ?")
            .bind(handle)
            .bind(&self.deployment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM AUTH_REQUEST WHERE DEPLOYMENT_ID = ? AND EXPIRY_TIME < ?")
            .bind(&self.deployment_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

struct MemoryEntry {
    params: OAuthParameters,
    expiry_time: DateTime<Utc>,
}

/// In-memory store used by the legacy authorization path and by tests.
///
/// Reads take the read side of the lock; an expired entry observed under
/// the read lock is deleted under a re-acquired write lock before
/// reporting `not found`.
pub struct MemoryAuthRequestStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    validity: Duration,
}

impl MemoryAuthRequestStore {
    pub fn new(validity_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            validity: Duration::seconds(validity_secs),
        }
    }
}

#[async_trait]
impl AuthRequestStore for MemoryAuthRequestStore {
    async fn add_request(&self, params: &OAuthParameters) -> Result<String, StoreError> {
        let handle = Uuid::new_v4().to_string();
        let entry = MemoryEntry {
            params: params.clone(),
            expiry_time: Utc::now() + self.validity,
        };

        let mut entries = self.entries.write().expect("auth request store lock poisoned");
        entries.insert(handle.clone(), entry);
        Ok(handle)
    }

    async fn get_request(&self, handle: &str) -> Result<Option<OAuthParameters>, StoreError> {
        if handle.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let expired = {
            let entries = self.entries.read().expect("auth request store lock poisoned");
            match entries.get(handle) {
                Some(entry) if entry.expiry_time > now => return Ok(Some(entry.params.clone())),
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().expect("auth request store lock poisoned");
            entries.remove(handle);
        }

        Ok(None)
    }

    async fn clear_request(&self, handle: &str) -> Result<(), StoreError> {
        if handle.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write().expect("auth request store lock poisoned");
        entries.remove(handle);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.write().expect("auth request store lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.expiry_time > now);
        Ok((before - entries.len()) as u64)
    }
}
