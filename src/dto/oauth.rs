//! OAuth2 request/response DTOs for the authorization endpoint
//!
//! Wire parameter names follow RFC 6749 (`client_id`, `redirect_uri`,
//! `response_type`, `scope`, `state`, `code_challenge`,
//! `code_challenge_method`) and RFC 8707 (`resource`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of request an `OAuthMessage` was marshalled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthRequestType {
    /// GET /oauth2/authorize — the client app opens the flow
    InitialAuthorizationRequest,
    /// POST /oauth2/authorize — the gate client posts the engine assertion
    AuthorizationResponseFromEngine,
    /// Reserved: consent decision posted by the user. Not implemented.
    ConsentResponseFromUser,
}

/// A marshalled authorization-endpoint request.
///
/// Both legs of the flow are normalized into this shape before any
/// validation runs: query parameters for the initial leg, body parameters
/// plus the context handle for the engine-response leg.
#[derive(Debug, Clone)]
pub struct OAuthMessage {
    pub request_type: OAuthRequestType,
    pub query_params: HashMap<String, String>,
    pub body_params: HashMap<String, String>,
    pub auth_id: String,
}

impl OAuthMessage {
    /// Marshal the initial GET request. Only the first value per key is
    /// kept; repeated parameters are ignored.
    pub fn initial(pairs: Vec<(String, String)>) -> Self {
        let mut query_params = HashMap::new();
        for (key, value) in pairs {
            query_params.entry(key).or_insert(value);
        }

        Self {
            request_type: OAuthRequestType::InitialAuthorizationRequest,
            query_params,
            body_params: HashMap::new(),
            auth_id: String::new(),
        }
    }

    /// Marshal the engine-response POST request.
    pub fn engine_response(auth_id: String, assertion: String) -> Self {
        let mut body_params = HashMap::new();
        body_params.insert("assertion".to_string(), assertion);

        Self {
            request_type: OAuthRequestType::AuthorizationResponseFromEngine,
            query_params: HashMap::new(),
            body_params,
            auth_id,
        }
    }

    fn query(&self, key: &str) -> &str {
        self.query_params.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn client_id(&self) -> &str {
        self.query("client_id")
    }

    pub fn redirect_uri(&self) -> &str {
        self.query("redirect_uri")
    }

    pub fn response_type(&self) -> &str {
        self.query("response_type")
    }

    pub fn scope(&self) -> &str {
        self.query("scope")
    }

    pub fn state(&self) -> &str {
        self.query("state")
    }

    pub fn code_challenge(&self) -> &str {
        self.query("code_challenge")
    }

    pub fn code_challenge_method(&self) -> &str {
        self.query("code_challenge_method")
    }

    pub fn resource(&self) -> &str {
        self.query("resource")
    }

    pub fn assertion(&self) -> &str {
        self.body_params.get("assertion").map(String::as_str).unwrap_or("")
    }
}

/// POST /oauth2/authorize request body — the engine-response leg.
///
/// Both fields are required; a missing field fails body deserialization
/// and the handler answers 400 `invalid_request`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponseRequest {
    #[serde(rename = "authId")]
    pub auth_id: String,
    pub assertion: String,
}

/// POST /oauth2/authorize success body.
///
/// The 200-response JSON carries the redirect target because the caller
/// is the front-channel client, not the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeFinishResponse {
    pub redirect_uri: String,
}
