//! Shared fixtures and in-memory collaborators for tests.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{AppState, Config};
use crate::error::{AssertionError, DirectoryError, FlowEngineError, StoreError};
use crate::external::{
    ApplicationRegistry, AssertionVerifier, DirectoryUser, FlowEngine, FlowInitRequest,
    FlowInitResponse, UserDirectory,
};
use crate::models::{CredentialDocument, OAuthApplication, TokenEndpointAuthMethod};
use crate::repositories::{
    MemoryAuthRequestStore, MemoryAuthorizationCodeStore, MemoryPasskeySessionStore,
};
use crate::services::federated::AuthenticatorRegistry;

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        server_identifier: "default".to_string(),
        gate_client_scheme: "https".to_string(),
        gate_client_hostname: "gate.example.com".to_string(),
        gate_client_port: 9001,
        gate_client_login_path: "/login".to_string(),
        gate_client_error_path: "/error".to_string(),
        authorization_code_validity_secs: 300,
        auth_request_validity_secs: 600,
        auth_request_store: "memory".to_string(),
        passkey_session_validity_secs: 300,
        expiry_sweep_interval_secs: 300,
        passkey_origin_scheme: "https".to_string(),
        assertion_public_key: String::new(),
        directory_base_url: String::new(),
        flow_engine_base_url: String::new(),
    }
}

pub fn test_app() -> OAuthApplication {
    OAuthApplication {
        app_id: "test-app-id".to_string(),
        app_name: "Test App".to_string(),
        client_id: "test-client-id".to_string(),
        hashed_client_secret: String::new(),
        redirect_uris: vec!["https://client.example.com/callback".to_string()],
        grant_types: vec!["authorization_code".to_string()],
        response_types: vec!["code".to_string()],
        token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
        public_client: false,
        pkce_required: false,
    }
}

/// Registry serving exactly one application.
pub struct StaticRegistry(pub OAuthApplication);

#[async_trait]
impl ApplicationRegistry for StaticRegistry {
    async fn get_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthApplication>, StoreError> {
        Ok((self.0.client_id == client_id).then(|| self.0.clone()))
    }
}

/// Flow engine that always starts flow-1.
pub struct StaticFlowEngine;

#[async_trait]
impl FlowEngine for StaticFlowEngine {
    async fn initiate_flow(
        &self,
        _request: &FlowInitRequest,
    ) -> Result<FlowInitResponse, FlowEngineError> {
        Ok(FlowInitResponse {
            flow_id: "flow-1".to_string(),
        })
    }
}

/// Verifier accepting any assertion except the literal "bad", answering
/// with a fixed claims map.
pub struct StaticVerifier(pub Map<String, Value>);

impl StaticVerifier {
    pub fn for_user(user_id: &str) -> Self {
        let claims = json!({
            "sub": user_id,
            "iat": 1767225600,
            "authorized_permissions": "read write"
        });
        Self(claims.as_object().unwrap().clone())
    }
}

#[async_trait]
impl AssertionVerifier for StaticVerifier {
    async fn verify(&self, assertion: &str) -> Result<Map<String, Value>, AssertionError> {
        if assertion == "bad" {
            return Err(AssertionError::Verification("signature mismatch".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Directory with a fixed user set and an in-memory credential document
/// per user.
pub struct MockDirectory {
    users: HashMap<String, DirectoryUser>,
    credentials: RwLock<HashMap<String, CredentialDocument>>,
}

impl MockDirectory {
    pub fn with_user(user_id: &str) -> Self {
        let mut user = DirectoryUser::default();
        user.id = user_id.to_string();
        user.attributes = json!({
            "username": "alice",
            "email": "alice@example.com",
            "firstName": "Alice",
            "lastName": "Doe"
        })
        .as_object()
        .unwrap()
        .clone();

        let mut users = HashMap::new();
        users.insert(user_id.to_string(), user);
        Self {
            users,
            credentials: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, DirectoryError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or(DirectoryError::UserNotFound)
    }

    async fn find_user_by_claim(
        &self,
        _claim: &str,
        value: &str,
    ) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.get(value).cloned())
    }

    async fn get_credentials(&self, user_id: &str) -> Result<CredentialDocument, DirectoryError> {
        if !self.users.contains_key(user_id) {
            return Err(DirectoryError::UserNotFound);
        }
        let documents = self.credentials.read().unwrap();
        Ok(documents.get(user_id).cloned().unwrap_or_default())
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        document: &CredentialDocument,
    ) -> Result<(), DirectoryError> {
        let mut documents = self.credentials.write().unwrap();
        documents.insert(user_id.to_string(), document.clone());
        Ok(())
    }
}

/// Fully in-memory application state for router tests.
pub fn test_state(app: OAuthApplication) -> AppState {
    AppState {
        config: Arc::new(test_config()),
        auth_requests: Arc::new(MemoryAuthRequestStore::new(600)),
        authorization_codes: Arc::new(MemoryAuthorizationCodeStore::new()),
        passkey_sessions: Arc::new(MemoryPasskeySessionStore::new()),
        applications: Arc::new(StaticRegistry(app)),
        directory: Arc::new(MockDirectory::with_user("user123")),
        flow_engine: Arc::new(StaticFlowEngine),
        assertion_verifier: Arc::new(StaticVerifier::for_user("alice")),
        authenticators: Arc::new(AuthenticatorRegistry::new()),
    }
}
