//! Initial authorization-request validation
//!
//! A deterministic, order-sensitive rule set applied to the GET leg of
//! the authorization-code flow. The outcome decides between two error
//! routes: until the client and redirect URI are trusted (rules 1–2),
//! errors go to the local error page; from rule 3 on, RFC 6749 §4.1.2.1
//! redirect semantics apply and errors go back to the client.

use crate::dto::OAuthMessage;
use crate::models::OAuthApplication;
use crate::utils::pkce;
use crate::utils::uri::validate_resource_uri;

/// A failed validation, carrying the routing decision and the RFC 6749
/// error tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Redirect the error to the client's redirect URI instead of the
    /// local error page. Only ever true once the redirect URI is vetted.
    pub send_error_to_client: bool,
    pub error_code: &'static str,
    pub error_description: String,
}

impl ValidationFailure {
    fn local(error_code: &'static str, description: &str) -> Self {
        Self {
            send_error_to_client: false,
            error_code,
            error_description: description.to_string(),
        }
    }

    fn to_client(error_code: &'static str, description: &str) -> Self {
        Self {
            send_error_to_client: true,
            error_code,
            error_description: description.to_string(),
        }
    }
}

/// Validate an initial authorization request against the registered
/// application. Pure function of its inputs.
pub fn validate_initial_authorization_request(
    msg: &OAuthMessage,
    app: &OAuthApplication,
) -> Result<(), ValidationFailure> {
    // 1. Without a resolved client there is no trustworthy redirect URI;
    //    the error must be shown to the user.
    if msg.client_id().is_empty() {
        return Err(ValidationFailure::local(
            "invalid_request",
            "Missing client_id parameter",
        ));
    }

    // 2. Redirect URI must match the registered set. An omitted URI is
    //    acceptable only when the app has exactly one registered URI.
    let redirect_uri = msg.redirect_uri();
    if redirect_uri.is_empty() {
        if app.default_redirect_uri().is_none() {
            return Err(ValidationFailure::local("invalid_request", "Invalid redirect URI"));
        }
    } else if !app.has_redirect_uri(redirect_uri) {
        return Err(ValidationFailure::local("invalid_request", "Invalid redirect URI"));
    }

    // From here on the redirect URI is trusted.

    // 3.
    if !app.allows_grant_type("authorization_code") {
        return Err(ValidationFailure::to_client(
            "unsupported_grant_type",
            "Authorization code grant is not allowed for the client",
        ));
    }

    // 4.
    let response_type = msg.response_type();
    if response_type.is_empty() {
        return Err(ValidationFailure::to_client(
            "invalid_request",
            "Missing response_type parameter",
        ));
    }

    // 5.
    if !app.allows_response_type(response_type) {
        return Err(ValidationFailure::to_client(
            "unsupported_response_type",
            "Unsupported response type",
        ));
    }

    // 6.
    if app.pkce_required && response_type == "code" {
        let challenge = msg.code_challenge();
        if challenge.is_empty() {
            return Err(ValidationFailure::to_client(
                "invalid_request",
                "code_challenge is required for this application",
            ));
        }
        if !pkce::is_supported_method(msg.code_challenge_method()) {
            return Err(ValidationFailure::to_client(
                "invalid_request",
                "Unsupported code_challenge_method",
            ));
        }
        if !pkce::validate_code_challenge(challenge) {
            return Err(ValidationFailure::to_client(
                "invalid_request",
                "Invalid code_challenge format",
            ));
        }
    }

    // 7.
    let resource = msg.resource();
    if !resource.is_empty() {
        if let Err(description) = validate_resource_uri(resource) {
            return Err(ValidationFailure::to_client("invalid_target", description));
        }
    }

    Ok(())
}
