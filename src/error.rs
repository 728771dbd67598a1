use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// RFC 6749 / RFC 8707 error response body.
///
/// This is the only error shape the OAuth endpoints put on the wire;
/// internal error details stay in the logs.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    pub error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl OAuthErrorBody {
    pub fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.to_string(),
            error_uri: None,
            state: None,
        }
    }
}

/// OAuth2 protocol errors (RFC 6749 §4.1.2.1, §5.2; RFC 8707)
#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidClient(String),

    #[error("{0}")]
    InvalidGrant(String),

    #[error("{0}")]
    UnauthorizedClient(String),

    #[error("{0}")]
    UnsupportedGrantType(String),

    #[error("{0}")]
    UnsupportedResponseType(String),

    #[error("{0}")]
    InvalidScope(String),

    #[error("{0}")]
    InvalidTarget(String),

    #[error("{0}")]
    ServerError(String),
}

impl OAuthError {
    /// The RFC 6749/8707 error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnauthorizedClient(_) => "unauthorized_client",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidTarget(_) => "invalid_target",
            OAuthError::ServerError(_) => "server_error",
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            OAuthError::InvalidClient(_) | OAuthError::UnauthorizedClient(_) => {
                StatusCode::UNAUTHORIZED
            }
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        let body = Json(OAuthErrorBody::new(self.error_code(), &self.to_string()));
        (status, body).into_response()
    }
}

/// Client-authentication failures raised by the confidential-endpoint
/// middleware. The taxonomy is fixed; descriptions are wire-safe.
#[derive(Debug, thiserror::Error)]
pub enum ClientAuthError {
    /// No credentials in either the Authorization header or the body
    #[error("Missing client_id parameter")]
    MissingCredentials,

    /// Non-Basic scheme, undecodable base64 or a missing colon
    #[error("Invalid authorization header")]
    InvalidAuthorizationHeader,

    /// Credentials supplied in both the header and the body
    #[error("Client credentials provided in both header and body")]
    DuplicateCredentials,

    /// Client lookup returned nothing (or failed)
    #[error("Invalid client credentials")]
    UnknownClient,

    /// Transport used does not match the app's declared auth method
    #[error("Client authentication method not allowed for this client")]
    AuthMethodMismatch,

    /// Thumbprint comparison failed
    #[error("Invalid client credentials")]
    InvalidSecret,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ClientAuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ClientAuthError::MissingCredentials => (StatusCode::UNAUTHORIZED, "invalid_client"),
            ClientAuthError::InvalidAuthorizationHeader => {
                (StatusCode::UNAUTHORIZED, "invalid_client")
            }
            ClientAuthError::DuplicateCredentials => (StatusCode::BAD_REQUEST, "invalid_request"),
            ClientAuthError::UnknownClient => (StatusCode::UNAUTHORIZED, "invalid_client"),
            ClientAuthError::AuthMethodMismatch => {
                (StatusCode::UNAUTHORIZED, "unauthorized_client")
            }
            ClientAuthError::InvalidSecret => (StatusCode::UNAUTHORIZED, "invalid_client"),
            ClientAuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        };

        let body = Json(OAuthErrorBody::new(code, &self.to_string()));

        if matches!(self, ClientAuthError::InvalidAuthorizationHeader) {
            (status, [(header::WWW_AUTHENTICATE, "Basic")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Error response body for the passkey endpoints
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Passkey ceremony errors
#[derive(Debug, thiserror::Error)]
pub enum PasskeyError {
    #[error("Invalid finish request data")]
    InvalidFinishData,

    #[error("User identifier is empty")]
    EmptyUserIdentifier,

    #[error("Relying party identifier is empty")]
    EmptyRelyingPartyId,

    #[error("Credential identifier is empty")]
    EmptyCredentialId,

    #[error("Session token is empty")]
    EmptySessionToken,

    #[error("Session not found or expired")]
    SessionExpired,

    #[error("User not found")]
    UserNotFound,

    #[error("No passkey credentials found for user")]
    NoCredentialsFound,

    #[error("Invalid authenticator response: {0}")]
    InvalidAuthenticatorResponse(String),

    #[error("Invalid attestation response: {0}")]
    InvalidAttestationResponse(String),

    #[error("Signature validation failed")]
    InvalidSignature,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for PasskeyError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            PasskeyError::InvalidFinishData => (StatusCode::BAD_REQUEST, "invalid_finish_data"),
            PasskeyError::EmptyUserIdentifier => {
                (StatusCode::BAD_REQUEST, "empty_user_identifier")
            }
            PasskeyError::EmptyRelyingPartyId => {
                (StatusCode::BAD_REQUEST, "empty_relying_party_id")
            }
            PasskeyError::EmptyCredentialId => (StatusCode::BAD_REQUEST, "empty_credential_id"),
            PasskeyError::EmptySessionToken => (StatusCode::BAD_REQUEST, "empty_session_token"),
            PasskeyError::SessionExpired => (StatusCode::BAD_REQUEST, "session_expired"),
            PasskeyError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found"),
            PasskeyError::NoCredentialsFound => (StatusCode::NOT_FOUND, "no_credentials_found"),
            PasskeyError::InvalidAuthenticatorResponse(_) => {
                (StatusCode::BAD_REQUEST, "invalid_authenticator_response")
            }
            PasskeyError::InvalidAttestationResponse(_) => {
                (StatusCode::BAD_REQUEST, "invalid_attestation_response")
            }
            PasskeyError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            PasskeyError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Persistence errors shared by the request/code/session stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Authorization code not found")]
    CodeNotFound,

    #[error("Authorization code is not active")]
    CodeNotActive,

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

/// User-directory service errors. `UserNotFound` is the client-class
/// error; everything else is a server-side failure.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("User not found")]
    UserNotFound,

    #[error("Directory service error: {0}")]
    Service(String),

    #[error("Directory transport error")]
    Transport(#[from] reqwest::Error),
}

/// Flow-engine errors
#[derive(Debug, thiserror::Error)]
pub enum FlowEngineError {
    #[error("Flow engine error: {0}")]
    Service(String),

    #[error("Flow engine transport error")]
    Transport(#[from] reqwest::Error),
}

/// Assertion verification errors
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error("Assertion verification failed: {0}")]
    Verification(String),

    #[error("Invalid assertion claims: {0}")]
    InvalidClaims(String),
}

/// Federated authenticator errors
#[derive(Debug, thiserror::Error)]
pub enum FederatedAuthError {
    #[error("Unknown identity provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid identity provider configuration: {0}")]
    Config(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("User info fetch failed: {0}")]
    UserInfo(String),

    #[error("Missing or invalid claim: {0}")]
    Claim(String),

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("Identity provider transport error")]
    Transport(#[from] reqwest::Error),
}
