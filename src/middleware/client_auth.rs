//! Client-authentication middleware for confidential endpoints
//!
//! Validates `client_id`/`client_secret` before token, revocation and
//! introspection handlers run. Credentials arrive either in an
//! `Authorization: Basic` header or in the form body, never both, and the
//! transport must match the application's declared
//! `token_endpoint_auth_method`. On success an [`OAuthClientInfo`] is
//! attached to the request for downstream handlers.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        Request,
    },
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::config::AppState;
use crate::error::ClientAuthError;
use crate::models::{OAuthApplication, TokenEndpointAuthMethod};
use crate::utils::pkce::constant_time_compare;

/// The authenticated client, attached to the request after successful
/// client authentication.
#[derive(Debug, Clone)]
pub struct OAuthClientInfo {
    pub client_id: String,
    pub client_secret: String,
    pub application: OAuthApplication,
}

/// Where the credentials were carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialSource {
    BasicHeader,
    FormBody,
}

pub async fn client_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ClientAuthError> {
    let (parts, body) = request.into_parts();

    let header_credentials = parse_basic_header(&parts)?;

    // The form body is consumed here and handed back to the downstream
    // handler untouched.
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ClientAuthError::Internal(anyhow::anyhow!("failed to read body: {e}")))?;

    let (body_client_id, body_client_secret) = if is_form_content(&parts) {
        parse_form_credentials(&bytes)
    } else {
        (None, None)
    };

    let body_has_credentials = body_client_id.is_some() || body_client_secret.is_some();
    if header_credentials.is_some() && body_has_credentials {
        return Err(ClientAuthError::DuplicateCredentials);
    }

    let (client_id, client_secret, source) = match header_credentials {
        Some((id, secret)) => (id, Some(secret), CredentialSource::BasicHeader),
        None => match body_client_id {
            Some(id) => (id, body_client_secret, CredentialSource::FormBody),
            None => return Err(ClientAuthError::MissingCredentials),
        },
    };

    let application = match state.applications.get_application_by_client_id(&client_id).await {
        Ok(Some(application)) => application,
        Ok(None) => return Err(ClientAuthError::UnknownClient),
        Err(e) => {
            tracing::error!("client lookup failed for {}: {}", client_id, e);
            return Err(ClientAuthError::UnknownClient);
        }
    };

    // The transport must match the app's declared auth method.
    match application.token_endpoint_auth_method {
        TokenEndpointAuthMethod::ClientSecretBasic => {
            if source != CredentialSource::BasicHeader {
                return Err(ClientAuthError::AuthMethodMismatch);
            }
        }
        TokenEndpointAuthMethod::ClientSecretPost => {
            if source != CredentialSource::FormBody || client_secret.is_none() {
                return Err(ClientAuthError::AuthMethodMismatch);
            }
        }
        TokenEndpointAuthMethod::None => {
            if source != CredentialSource::FormBody || client_secret.is_some() {
                return Err(ClientAuthError::AuthMethodMismatch);
            }
        }
    }

    // Public clients carry no secret; everyone else is checked against
    // the registration-time thumbprint in constant time.
    let client_secret = client_secret.unwrap_or_default();
    if application.token_endpoint_auth_method != TokenEndpointAuthMethod::None {
        let thumbprint = client_secret_thumbprint(&client_secret);
        if !constant_time_compare(&thumbprint, &application.hashed_client_secret) {
            return Err(ClientAuthError::InvalidSecret);
        }
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(OAuthClientInfo {
        client_id,
        client_secret,
        application,
    });

    Ok(next.run(request).await)
}

/// The thumbprint hash applied to client secrets at registration time.
pub fn client_secret_thumbprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract credentials from an `Authorization: Basic` header.
///
/// No header means no credentials (`Ok(None)`). A present header with a
/// different scheme, undecodable base64, a missing colon or an empty
/// field is a malformed-header error.
fn parse_basic_header(parts: &Parts) -> Result<Option<(String, String)>, ClientAuthError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ClientAuthError::InvalidAuthorizationHeader)?;

    let encoded = value
        .strip_prefix("Basic ")
        .ok_or(ClientAuthError::InvalidAuthorizationHeader)?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ClientAuthError::InvalidAuthorizationHeader)?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| ClientAuthError::InvalidAuthorizationHeader)?;

    let (client_id, client_secret) = decoded
        .split_once(':')
        .ok_or(ClientAuthError::InvalidAuthorizationHeader)?;

    if client_id.is_empty() || client_secret.is_empty() {
        return Err(ClientAuthError::InvalidAuthorizationHeader);
    }

    Ok(Some((client_id.to_string(), client_secret.to_string())))
}

fn is_form_content(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn parse_form_credentials(bytes: &[u8]) -> (Option<String>, Option<String>) {
    let mut client_id = None;
    let mut client_secret = None;

    for (key, value) in url::form_urlencoded::parse(bytes) {
        match key.as_ref() {
            "client_id" if client_id.is_none() => client_id = Some(value.into_owned()),
            "client_secret" if client_secret.is_none() => {
                client_secret = Some(value.into_owned())
            }
            _ => {}
        }
    }

    (client_id, client_secret)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OAuthClientInfo
where
    S: Send + Sync,
{
    type Rejection = ClientAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OAuthClientInfo>()
            .cloned()
            .ok_or(ClientAuthError::MissingCredentials)
    }
}
