//! GitHub flavour of the federated OAuth authenticator
//!
//! GitHub keeps private email addresses out of the user endpoint, so when
//! the configured scopes allow it the authenticator makes a secondary
//! call to the emails endpoint and splices the primary address into the
//! user info before claim normalization completes.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FederatedAuthError;
use crate::external::DirectoryUser;
use crate::models::IdpConfig;

use super::{process_sub_claim, FederatedAuthenticator, FederatedTokenResponse, OAuthAuthenticator};

pub const GITHUB_AUTHENTICATOR_NAME: &str = "github";

/// Scopes that unlock the emails endpoint.
const EMAIL_SCOPES: [&str; 2] = ["user", "user:email"];

const DEFAULT_EMAIL_ENDPOINT: &str = "https://api.github.com/user/emails";

/// An entry of GitHub's /user/emails response.
#[derive(Debug, Deserialize)]
struct GithubEmail {
    #[serde(default)]
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    #[allow(dead_code)]
    verified: bool,
}

/// GitHub authenticator: the generic OAuth core plus email resolution.
pub struct GithubAuthenticator {
    inner: OAuthAuthenticator,
    http: reqwest::Client,
}

impl GithubAuthenticator {
    pub fn new(http: reqwest::Client, inner: OAuthAuthenticator) -> Self {
        Self { inner, http }
    }

    async fn fetch_primary_email(
        &self,
        config: &IdpConfig,
        access_token: &str,
    ) -> Result<Option<String>, FederatedAuthError> {
        let endpoint = if config.email_endpoint.is_empty() {
            DEFAULT_EMAIL_ENDPOINT
        } else {
            &config.email_endpoint
        };

        let response = self
            .http
            .get(endpoint)
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(USER_AGENT, super::OUTBOUND_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FederatedAuthError::UserInfo(format!(
                "emails endpoint returned {}",
                response.status()
            )));
        }

        let emails: Vec<GithubEmail> = response
            .json()
            .await
            .map_err(|e| FederatedAuthError::UserInfo(format!("invalid emails response: {e}")))?;

        Ok(pick_primary_email(emails))
    }
}

#[async_trait]
impl FederatedAuthenticator for GithubAuthenticator {
    async fn build_authorize_url(&self, idp_id: &str) -> Result<String, FederatedAuthError> {
        self.inner.build_authorize_url(idp_id).await
    }

    async fn exchange_code_for_token(
        &self,
        idp_id: &str,
        code: &str,
        validate_response: bool,
    ) -> Result<FederatedTokenResponse, FederatedAuthError> {
        self.inner
            .exchange_code_for_token(idp_id, code, validate_response)
            .await
    }

    async fn fetch_user_info(
        &self,
        idp_id: &str,
        access_token: &str,
    ) -> Result<Map<String, Value>, FederatedAuthError> {
        let mut info = self.inner.fetch_user_info(idp_id, access_token).await?;

        if is_email_missing(&info) {
            let config = self.inner.get_oauth_client_config(idp_id).await?;
            if config.has_any_scope(&EMAIL_SCOPES) {
                if let Some(email) = self.fetch_primary_email(&config, access_token).await? {
                    info.insert("email".to_string(), Value::String(email));
                }
            }
        }

        process_sub_claim(&mut info)?;
        Ok(info)
    }

    async fn get_internal_user(
        &self,
        sub: &str,
    ) -> Result<Option<DirectoryUser>, FederatedAuthError> {
        self.inner.get_internal_user(sub).await
    }

    async fn get_oauth_client_config(
        &self,
        idp_id: &str,
    ) -> Result<IdpConfig, FederatedAuthError> {
        self.inner.get_oauth_client_config(idp_id).await
    }
}

fn is_email_missing(info: &Map<String, Value>) -> bool {
    match info.get("email") {
        Some(Value::String(email)) => email.is_empty(),
        Some(Value::Null) | None => true,
        Some(_) => true,
    }
}

fn pick_primary_email(emails: Vec<GithubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|entry| entry.primary && !entry.email.is_empty())
        .map(|entry| entry.email)
}
