use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration of a federated identity provider, stored as the JSON
/// `CONFIG` column of the `IDP` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdpConfig {
    #[serde(default)]
    pub idp_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    #[serde(default)]
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: String,
    /// Secondary endpoint for providers that serve email addresses
    /// separately (GitHub's /user/emails)
    #[serde(default)]
    pub email_endpoint: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Provider claim name → canonical claim name
    #[serde(default)]
    pub claim_mappings: HashMap<String, String>,
}

impl IdpConfig {
    /// Whether the configured scopes include any of the given scopes.
    pub fn has_any_scope(&self, wanted: &[&str]) -> bool {
        self.scopes.iter().any(|s| wanted.contains(&s.as_str()))
    }
}
