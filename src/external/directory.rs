//! User-directory service client
//!
//! The directory owns user records and per-user credential documents.
//! This core only reads users and reads/writes the credential document;
//! everything else about the directory is opaque.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DirectoryError;
use crate::models::CredentialDocument;

/// A user record as returned by the directory service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub ou_id: String,
    #[serde(default)]
    pub ou_name: String,
    #[serde(default)]
    pub ou_handle: String,
    /// Free-form profile attributes (username, email, firstName, …)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DirectoryUser {
    /// Read a string attribute, empty when absent or non-string.
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).and_then(Value::as_str).unwrap_or("")
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by id. A missing user is the client-class error
    /// `DirectoryError::UserNotFound`; everything else is server-side.
    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, DirectoryError>;

    /// Find a user by a profile claim (used to resolve federated `sub`
    /// values to internal users).
    async fn find_user_by_claim(
        &self,
        claim: &str,
        value: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Fetch the user's credential document.
    async fn get_credentials(&self, user_id: &str) -> Result<CredentialDocument, DirectoryError>;

    /// Replace the user's credential document.
    async fn update_credentials(
        &self,
        user_id: &str,
        document: &CredentialDocument,
    ) -> Result<(), DirectoryError>;
}

/// HTTP client for the directory service's REST surface.
pub struct RestUserDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl RestUserDirectory {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn service_error(context: &str, status: StatusCode) -> DirectoryError {
        DirectoryError::Service(format!("{context} returned {status}"))
    }
}

#[async_trait]
impl UserDirectory for RestUserDirectory {
    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, DirectoryError> {
        let url = format!("{}/users/{}", self.base_url, urlencoding::encode(user_id));
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(Self::service_error("user lookup", status)),
        }
    }

    async fn find_user_by_claim(
        &self,
        claim: &str,
        value: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        let url = format!("{}/users/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("claim", claim), ("value", value)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("user search", response.status()));
        }

        let mut users: Vec<DirectoryUser> = response.json().await?;
        Ok(if users.is_empty() {
            None
        } else {
            Some(users.remove(0))
        })
    }

    async fn get_credentials(&self, user_id: &str) -> Result<CredentialDocument, DirectoryError> {
        let url = format!(
            "{}/users/{}/credentials",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound),
            status if status.is_success() => {
                let document: Map<String, Value> = response.json().await?;
                Ok(CredentialDocument(document))
            }
            status => Err(Self::service_error("credential fetch", status)),
        }
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        document: &CredentialDocument,
    ) -> Result<(), DirectoryError> {
        let url = format!(
            "{}/users/{}/credentials",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let response = self.http.put(&url).json(&document.0).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound),
            status if status.is_success() => Ok(()),
            status => Err(Self::service_error("credential update", status)),
        }
    }
}
