use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::error::StoreError;
use crate::models::IdpConfig;

/// Lookup of federated identity-provider configurations.
#[async_trait]
pub trait IdpConfigStore: Send + Sync {
    async fn get_idp(&self, idp_id: &str) -> Result<Option<IdpConfig>, StoreError>;
}

pub struct SqlIdpConfigStore {
    pool: MySqlPool,
}

impl SqlIdpConfigStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdpConfigStore for SqlIdpConfigStore {
    async fn get_idp(&self, idp_id: &str) -> Result<Option<IdpConfig>, StoreError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT CONFIG FROM IDP WHERE IDP_ID = ?")
                .bind(idp_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(config) => {
                let mut config: IdpConfig = serde_json::from_value(config)
                    .map_err(|e| StoreError::CorruptRow(format!("invalid idp config: {e}")))?;
                if config.idp_id.is_empty() {
                    config.idp_id = idp_id.to_string();
                }
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }
}
