use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How a client authenticates at confidential endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

impl TokenEndpointAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEndpointAuthMethod::ClientSecretBasic => "client_secret_basic",
            TokenEndpointAuthMethod::ClientSecretPost => "client_secret_post",
            TokenEndpointAuthMethod::None => "none",
        }
    }

    /// Parse the registered method string; unknown values fall back to
    /// `client_secret_basic`, the most restrictive option.
    pub fn parse(value: &str) -> Self {
        match value {
            "client_secret_post" => TokenEndpointAuthMethod::ClientSecretPost,
            "none" => TokenEndpointAuthMethod::None,
            _ => TokenEndpointAuthMethod::ClientSecretBasic,
        }
    }
}

/// A registered OAuth application, as configured in the application
/// registry. Read-only for this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthApplication {
    pub app_id: String,
    pub app_name: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub hashed_client_secret: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub public_client: bool,
    pub pkce_required: bool,
}

/// Row type for MySQL query results
#[derive(Debug, Clone, FromRow)]
pub struct OAuthApplicationRow {
    pub app_id: String,
    pub app_name: String,
    pub client_id: String,
    pub hashed_client_secret: String,
    pub redirect_uris: serde_json::Value,
    pub grant_types: serde_json::Value,
    pub response_types: serde_json::Value,
    pub token_endpoint_auth_method: String,
    pub public_client: bool,
    pub pkce_required: bool,
}

impl From<OAuthApplicationRow> for OAuthApplication {
    fn from(row: OAuthApplicationRow) -> Self {
        let redirect_uris: Vec<String> =
            serde_json::from_value(row.redirect_uris).unwrap_or_default();
        let grant_types: Vec<String> = serde_json::from_value(row.grant_types).unwrap_or_default();
        let response_types: Vec<String> =
            serde_json::from_value(row.response_types).unwrap_or_default();

        Self {
            app_id: row.app_id,
            app_name: row.app_name,
            client_id: row.client_id,
            hashed_client_secret: row.hashed_client_secret,
            redirect_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method: TokenEndpointAuthMethod::parse(
                &row.token_endpoint_auth_method,
            ),
            public_client: row.public_client,
            pkce_required: row.pkce_required,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for OAuthApplication {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let app_row = OAuthApplicationRow::from_row(row)?;
        Ok(OAuthApplication::from(app_row))
    }
}

impl OAuthApplication {
    /// Check whether a grant type is allowed for this application
    pub fn allows_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Check whether a response type is allowed for this application
    pub fn allows_response_type(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }

    /// Check whether a redirect URI is registered for this application
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// The default redirect URI, available only when exactly one URI is
    /// registered.
    pub fn default_redirect_uri(&self) -> Option<&str> {
        if self.redirect_uris.len() == 1 {
            self.redirect_uris.first().map(String::as_str)
        } else {
            None
        }
    }
}
