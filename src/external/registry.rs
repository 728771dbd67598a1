//! Application registry lookup
//!
//! OAuth application configuration is owned by the registry; this core
//! only resolves clients by their public identifier.

use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::error::StoreError;
use crate::models::OAuthApplication;

#[async_trait]
pub trait ApplicationRegistry: Send + Sync {
    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthApplication>, StoreError>;
}

/// Registry backed by the shared database.
pub struct SqlApplicationRegistry {
    pool: MySqlPool,
}

impl SqlApplicationRegistry {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRegistry for SqlApplicationRegistry {
    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthApplication>, StoreError> {
        let app = sqlx::query_as::<_, OAuthApplication>(
            r#"
            SELECT APP_ID AS app_id, APP_NAME AS app_name, CLIENT_ID AS client_id,
                   HASHED_CLIENT_SECRET AS hashed_client_secret,
                   REDIRECT_URIS AS redirect_uris, GRANT_TYPES AS grant_types,
                   RESPONSE_TYPES AS response_types,
                   TOKEN_ENDPOINT_AUTH_METHOD AS token_endpoint_auth_method,
                   PUBLIC_CLIENT AS public_client, PKCE_REQUIRED AS pkce_required
            FROM OAUTH_APPLICATION
            WHERE CLIENT_ID = ?
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(app)
    }
}
