//! Passkey ceremony request/response DTOs
//!
//! Binary WebAuthn fields (`credential_id`, `client_data_json`,
//! `attestation_object`, `authenticator_data`, `signature`,
//! `user_handle`) travel base64url-encoded without padding.

use serde::{Deserialize, Serialize};
use webauthn_rs::prelude::{CreationChallengeResponse, RequestChallengeResponse};

/// POST /passkey/registration/start
#[derive(Debug, Clone, Deserialize)]
pub struct StartRegistrationRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub relying_party_id: String,
    #[serde(default)]
    pub relying_party_name: Option<String>,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
    #[serde(default)]
    pub resident_key: Option<String>,
    #[serde(default)]
    pub user_verification: Option<String>,
    #[serde(default)]
    pub attestation: Option<String>,
}

/// POST /passkey/registration/start response
#[derive(Debug, Clone, Serialize)]
pub struct StartRegistrationResponse {
    pub session_token: String,
    pub public_key_credential_creation_options: CreationChallengeResponse,
}

/// POST /passkey/registration/finish
#[derive(Debug, Clone, Deserialize)]
pub struct FinishRegistrationRequest {
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub relying_party_id: String,
    #[serde(default)]
    pub credential_id: String,
    #[serde(default)]
    pub credential_type: String,
    #[serde(default)]
    pub client_data_json: String,
    #[serde(default)]
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Option<Vec<String>>,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

/// POST /passkey/registration/finish response
#[derive(Debug, Clone, Serialize)]
pub struct FinishRegistrationResponse {
    pub credential_id: String,
}

/// POST /passkey/authentication/start
#[derive(Debug, Clone, Deserialize)]
pub struct StartAuthenticationRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub relying_party_id: String,
    #[serde(default)]
    pub user_verification: Option<String>,
}

/// POST /passkey/authentication/start response
#[derive(Debug, Clone, Serialize)]
pub struct StartAuthenticationResponse {
    pub session_token: String,
    pub public_key_credential_request_options: RequestChallengeResponse,
}

/// POST /passkey/authentication/finish
#[derive(Debug, Clone, Deserialize)]
pub struct FinishAuthenticationRequest {
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub relying_party_id: String,
    #[serde(default)]
    pub credential_id: String,
    #[serde(default)]
    pub client_data_json: String,
    #[serde(default)]
    pub authenticator_data: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

/// POST /passkey/authentication/finish response — the authenticated user
#[derive(Debug, Clone, Serialize)]
pub struct FinishAuthenticationResponse {
    pub user_id: String,
    pub display_name: String,
    pub username: String,
}
