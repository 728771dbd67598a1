//! Authorization-code store
//!
//! Insert/lookup/state-transition of issued authorization codes. Top-level
//! columns carry the lookup keys and lifecycle state; everything else
//! rides in the `AUTHZ_DATA` JSON blob. Redemption is one-shot: the
//! deactivate transition is conditional on the row still being `ACTIVE`,
//! so of two racing redeemers at most one succeeds.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, MySqlPool};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    format_db_time, parse_db_time, AuthorizationCode, AuthzData, CodeState,
};

#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    async fn insert(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// Look up a code by `(client_id, code)`. Zero rows yield
    /// `StoreError::CodeNotFound`.
    async fn get(&self, client_id: &str, code: &str) -> Result<AuthorizationCode, StoreError>;

    /// `ACTIVE → INACTIVE`, conditional on the current state. Exactly one
    /// of two racing callers succeeds; the loser sees
    /// `StoreError::CodeNotActive`.
    async fn deactivate(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// `ACTIVE → REVOKED`. Idempotent: revoking a non-active code is a
    /// no-op.
    async fn revoke(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// `ACTIVE → EXPIRED`. Idempotent like `revoke`.
    async fn expire(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// Transition overdue `ACTIVE` rows to `EXPIRED`, then purge rows past
    /// their expiry. Returns the number purged.
    async fn sweep_expired(&self) -> Result<u64, StoreError>;
}

#[derive(Debug, FromRow)]
struct AuthorizationCodeRow {
    code_id: String,
    authorization_code: String,
    client_id: String,
    state: String,
    authz_data: serde_json::Value,
    time_created: String,
    expiry_time: String,
}

impl AuthorizationCodeRow {
    /// Field-level decode with explicit errors for corrupt rows.
    fn decode(self) -> Result<AuthorizationCode, StoreError> {
        if self.code_id.is_empty() {
            return Err(StoreError::CodeNotFound);
        }
        if self.authorization_code.is_empty() {
            return Err(StoreError::CorruptRow("empty authorization code".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(StoreError::CorruptRow("empty client_id".to_string()));
        }
        if self.state.is_empty() {
            return Err(StoreError::CorruptRow("empty state".to_string()));
        }

        let code_id = Uuid::parse_str(&self.code_id)
            .map_err(|_| StoreError::CorruptRow(format!("invalid code_id: {}", self.code_id)))?;
        let state = CodeState::parse(&self.state)?;
        let time_created = parse_db_time(&self.time_created)?;
        let expiry_time = parse_db_time(&self.expiry_time)?;
        let data: AuthzData = serde_json::from_value(self.authz_data)
            .map_err(|e| StoreError::CorruptRow(format!("invalid authz data: {e}")))?;

        Ok(AuthorizationCode::from_parts(
            code_id,
            self.authorization_code,
            self.client_id,
            state,
            time_created,
            expiry_time,
            data,
        ))
    }
}

/// Database-backed store (the production variant).
pub struct SqlAuthorizationCodeStore {
    pool: MySqlPool,
    deployment_id: String,
}

impl SqlAuthorizationCodeStore {
    pub fn new(pool: MySqlPool, deployment_id: String) -> Self {
        Self { pool, deployment_id }
    }

    async fn transition(
        &self,
        code: &AuthorizationCode,
        to: CodeState,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE AUTHORIZATION_CODE
            SET STATE = ?
            WHERE CODE_ID = ? AND DEPLOYMENT_ID = ? AND STATE = 'ACTIVE'
            "#,
        )
        .bind(to.as_str())
        .bind(code.code_id.to_string())
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuthorizationCodeStore for SqlAuthorizationCodeStore {
    async fn insert(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        let data = serde_json::to_value(code.authz_data())?;

        sqlx::query(
            r#"
            INSERT INTO AUTHORIZATION_CODE
            (CODE_ID, AUTHORIZATION_CODE, CLIENT_ID, STATE, AUTHZ_DATA,
             TIME_CREATED, EXPIRY_TIME, DEPLOYMENT_ID)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(code.code_id.to_string())
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.state.as_str())
        .bind(&data)
        .bind(format_db_time(code.time_created))
        .bind(format_db_time(code.expiry_time))
        .bind(&self.deployment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, client_id: &str, code: &str) -> Result<AuthorizationCode, StoreError> {
        let row: Option<AuthorizationCodeRow> = sqlx::query_as(
            r#"
            SELECT CODE_ID AS code_id, AUTHORIZATION_CODE AS authorization_code,
                   CLIENT_ID AS client_id, STATE AS state, AUTHZ_DATA AS authz_data,
                   TIME_CREATED AS time_created, EXPIRY_TIME AS expiry_time
            FROM AUTHORIZATION_CODE
            WHERE CLIENT_ID = ? AND AUTHORIZATION_CODE = ? AND DEPLOYMENT_ID = ?
            "#,
        )
        .bind(client_id)
        .bind(code)
        .bind(&self.deployment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::CodeNotFound)?.decode()
    }

    async fn deactivate(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        match self.transition(code, CodeState::Inactive).await? {
            0 => Err(StoreError::CodeNotActive),
            _ => Ok(()),
        }
    }

    async fn revoke(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        self.transition(code, CodeState::Revoked).await?;
        Ok(())
    }

    async fn expire(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        self.transition(code, CodeState::Expired).await?;
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = format_db_time(Utc::now());

        sqlx::query(
            r#"
            UPDATE AUTHORIZATION_CODE
            SET STATE = 'EXPIRED'
            WHERE DEPLOYMENT_ID = ? AND STATE = 'ACTIVE' AND EXPIRY_TIME < ?
            "#,
        )
        .bind(&self.deployment_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let result =
            sqlx::query("DELETE FROM AUTHORIZATION_CODE WHERE DEPLOYMENT_ID = ? AND EXPIRY_TIME < ?")
                .bind(&self.deployment_id)
                .bind(&now)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

/// In-memory store for tests; reproduces the conditional-transition
/// semantics of the SQL variant under a lock.
#[derive(Default)]
pub struct MemoryAuthorizationCodeStore {
    codes: Mutex<HashMap<(String, String), AuthorizationCode>>,
}

impl MemoryAuthorizationCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(&self, code: &AuthorizationCode, to: CodeState) -> bool {
        let mut codes = self.codes.lock().expect("code store lock poisoned");
        match codes.get_mut(&(code.client_id.clone(), code.code.clone())) {
            Some(stored) if stored.state == CodeState::Active => {
                stored.state = to;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryAuthorizationCodeStore {
    async fn insert(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        let mut codes = self.codes.lock().expect("code store lock poisoned");
        let key = (code.client_id.clone(), code.code.clone());
        if codes.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "authorization code for client {}",
                code.client_id
            )));
        }
        codes.insert(key, code.clone());
        Ok(())
    }

    async fn get(&self, client_id: &str, code: &str) -> Result<AuthorizationCode, StoreError> {
        let codes = self.codes.lock().expect("code store lock poisoned");
        codes
            .get(&(client_id.to_string(), code.to_string()))
            .cloned()
            .ok_or(StoreError::CodeNotFound)
    }

    async fn deactivate(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        if self.transition(code, CodeState::Inactive) {
            Ok(())
        } else {
            Err(StoreError::CodeNotActive)
        }
    }

    async fn revoke(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        self.transition(code, CodeState::Revoked);
        Ok(())
    }

    async fn expire(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        self.transition(code, CodeState::Expired);
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut codes = self.codes.lock().expect("code store lock poisoned");
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired(now));
        Ok((before - codes.len()) as u64)
    }
}
