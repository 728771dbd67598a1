//! Federated OAuth authenticators for social login
//!
//! A federated authenticator is the capability set the login flow uses to
//! bounce a user through an external identity provider: build the
//! authorization URL, exchange the returned code, fetch and normalize the
//! user info, and resolve the provider subject to an internal user.
//! Providers extend the generic core by composition — see the GitHub
//! flavour in [`github`].

pub mod github;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::error::FederatedAuthError;
use crate::external::{DirectoryUser, UserDirectory};
use crate::models::IdpConfig;
use crate::repositories::IdpConfigStore;
use crate::utils::uri::append_query_param;

/// User agent sent on outbound IdP calls; some providers (GitHub) reject
/// requests without one.
const OUTBOUND_USER_AGENT: &str = concat!("idp-server/", env!("CARGO_PKG_VERSION"));

/// Token response from an identity provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedTokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// The capability set of a federated OAuth authenticator.
#[async_trait]
pub trait FederatedAuthenticator: Send + Sync {
    /// Compose the provider authorization URL for a login redirect.
    async fn build_authorize_url(&self, idp_id: &str) -> Result<String, FederatedAuthError>;

    /// Exchange an authorization code at the provider's token endpoint.
    /// With `validate_response` the token payload is checked for an
    /// access token before it is returned.
    async fn exchange_code_for_token(
        &self,
        idp_id: &str,
        code: &str,
        validate_response: bool,
    ) -> Result<FederatedTokenResponse, FederatedAuthError>;

    /// Fetch the provider's user info and normalize it to canonical
    /// claims. `sub` is guaranteed to be a non-empty string on success.
    async fn fetch_user_info(
        &self,
        idp_id: &str,
        access_token: &str,
    ) -> Result<Map<String, Value>, FederatedAuthError>;

    /// Resolve a provider subject to an internal directory user.
    async fn get_internal_user(
        &self,
        sub: &str,
    ) -> Result<Option<DirectoryUser>, FederatedAuthError>;

    /// The provider configuration backing this authenticator.
    async fn get_oauth_client_config(&self, idp_id: &str)
        -> Result<IdpConfig, FederatedAuthError>;
}

/// Generic OAuth 2.0 authenticator core. Provider flavours wrap this and
/// override what they must.
pub struct OAuthAuthenticator {
    http: reqwest::Client,
    idp_configs: Arc<dyn IdpConfigStore>,
    directory: Arc<dyn UserDirectory>,
}

impl OAuthAuthenticator {
    pub fn new(
        http: reqwest::Client,
        idp_configs: Arc<dyn IdpConfigStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            http,
            idp_configs,
            directory,
        }
    }

    async fn config(&self, idp_id: &str) -> Result<IdpConfig, FederatedAuthError> {
        match self.idp_configs.get_idp(idp_id).await {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(FederatedAuthError::UnknownProvider(idp_id.to_string())),
            Err(e) => Err(FederatedAuthError::Config(e.to_string())),
        }
    }
}

#[async_trait]
impl FederatedAuthenticator for OAuthAuthenticator {
    async fn build_authorize_url(&self, idp_id: &str) -> Result<String, FederatedAuthError> {
        let config = self.config(idp_id).await?;
        if config.authorization_endpoint.is_empty() {
            return Err(FederatedAuthError::Config(
                "missing authorization endpoint".to_string(),
            ));
        }

        let mut url = config.authorization_endpoint.clone();
        append_query_param(&mut url, "client_id", &config.client_id);
        append_query_param(&mut url, "redirect_uri", &config.redirect_uri);
        append_query_param(&mut url, "response_type", "code");
        if !config.scopes.is_empty() {
            append_query_param(&mut url, "scope", &config.scopes.join(" "));
        }
        append_query_param(&mut url, "state", &Uuid::new_v4().to_string());

        Ok(url)
    }

    async fn exchange_code_for_token(
        &self,
        idp_id: &str,
        code: &str,
        validate_response: bool,
    ) -> Result<FederatedTokenResponse, FederatedAuthError> {
        let config = self.config(idp_id).await?;

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&config.token_endpoint)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, OUTBOUND_USER_AGENT)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FederatedAuthError::Exchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: FederatedTokenResponse = response
            .json()
            .await
            .map_err(|e| FederatedAuthError::Exchange(format!("invalid token response: {e}")))?;

        if validate_response && token.access_token.is_empty() {
            return Err(FederatedAuthError::Exchange("empty access token".to_string()));
        }

        Ok(token)
    }

    async fn fetch_user_info(
        &self,
        idp_id: &str,
        access_token: &str,
    ) -> Result<Map<String, Value>, FederatedAuthError> {
        let config = self.config(idp_id).await?;

        let response = self
            .http
            .get(&config.userinfo_endpoint)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(USER_AGENT, OUTBOUND_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FederatedAuthError::UserInfo(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let raw: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| FederatedAuthError::UserInfo(format!("invalid userinfo response: {e}")))?;

        let mut claims = map_claims(&config, raw);
        process_sub_claim(&mut claims)?;
        Ok(claims)
    }

    async fn get_internal_user(
        &self,
        sub: &str,
    ) -> Result<Option<DirectoryUser>, FederatedAuthError> {
        self.directory
            .find_user_by_claim("sub", sub)
            .await
            .map_err(|e| FederatedAuthError::Directory(e.to_string()))
    }

    async fn get_oauth_client_config(
        &self,
        idp_id: &str,
    ) -> Result<IdpConfig, FederatedAuthError> {
        self.config(idp_id).await
    }
}

/// Rename provider claims to their canonical names per the IdP config.
/// Unmapped claims pass through untouched.
pub(crate) fn map_claims(config: &IdpConfig, raw: Map<String, Value>) -> Map<String, Value> {
    let mut claims = raw.clone();
    for (provider_name, canonical_name) in &config.claim_mappings {
        if provider_name == canonical_name {
            continue;
        }
        if let Some(value) = raw.get(provider_name) {
            claims.insert(canonical_name.clone(), value.clone());
            claims.remove(provider_name);
        }
    }
    claims
}

/// Ensure `sub` is a non-empty string, stringifying numeric subjects
/// (GitHub ids are numbers). Anything else is a hard failure: downstream
/// JWT minting needs a subject.
pub(crate) fn process_sub_claim(claims: &mut Map<String, Value>) -> Result<(), FederatedAuthError> {
    match claims.get("sub") {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        Some(Value::Number(n)) => {
            let sub = n.to_string();
            claims.insert("sub".to_string(), Value::String(sub));
            Ok(())
        }
        _ => Err(FederatedAuthError::Claim("sub".to_string())),
    }
}

/// A registered authenticator with its advertised metadata.
#[derive(Clone)]
pub struct RegisteredAuthenticator {
    pub name: String,
    pub factors: Vec<String>,
    pub associated_idp: String,
    pub authenticator: Arc<dyn FederatedAuthenticator>,
}

/// Central registry of federated authenticators, keyed by name.
#[derive(Default)]
pub struct AuthenticatorRegistry {
    inner: RwLock<HashMap<String, RegisteredAuthenticator>>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: RegisteredAuthenticator) {
        let mut inner = self.inner.write().expect("authenticator registry lock poisoned");
        inner.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<RegisteredAuthenticator> {
        let inner = self.inner.read().expect("authenticator registry lock poisoned");
        inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("authenticator registry lock poisoned");
        inner.keys().cloned().collect()
    }
}
