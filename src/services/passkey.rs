//! Passkey registration and authentication ceremonies
//!
//! Each ceremony is a two-call state machine: the start leg builds the
//! WebAuthn options and parks the ceremony state behind a one-shot
//! session token; the finish leg parses the authenticator response,
//! validates it against the stored state and persists the outcome in the
//! user's directory credential document.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;
use webauthn_rs::prelude::{
    PublicKeyCredential, RegisterPublicKeyCredential, Webauthn, WebauthnBuilder,
};
use webauthn_rs_proto::{
    AttestationConveyancePreference, AuthenticatorAttachment, UserVerificationPolicy,
};

use crate::config::AppState;
use crate::dto::{
    FinishAuthenticationRequest, FinishAuthenticationResponse, FinishRegistrationRequest,
    FinishRegistrationResponse, StartAuthenticationRequest, StartAuthenticationResponse,
    StartRegistrationRequest, StartRegistrationResponse,
};
use crate::error::{DirectoryError, PasskeyError};
use crate::external::{DirectoryUser, UserDirectory};
use crate::models::{
    CeremonyState, PasskeySessionData, StoredPasskeyCredential,
};
use crate::repositories::{PasskeySessionStore, RetrievedSession};

pub struct PasskeyService {
    sessions: Arc<dyn PasskeySessionStore>,
    directory: Arc<dyn UserDirectory>,
    origin_scheme: String,
    session_validity: Duration,
}

impl PasskeyService {
    pub fn new(
        sessions: Arc<dyn PasskeySessionStore>,
        directory: Arc<dyn UserDirectory>,
        origin_scheme: String,
        session_validity_secs: i64,
    ) -> Self {
        Self {
            sessions,
            directory,
            origin_scheme,
            session_validity: Duration::seconds(session_validity_secs),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.passkey_sessions.clone(),
            state.directory.clone(),
            state.config.passkey_origin_scheme.clone(),
            state.config.passkey_session_validity_secs,
        )
    }

    /// Build a verifier bound to the request's relying party. The origin
    /// is derived from the RP ID and the configured scheme.
    fn build_webauthn(&self, rp_id: &str, rp_name: &str) -> Result<Webauthn, PasskeyError> {
        let origin = Url::parse(&format!("{}://{}", self.origin_scheme, rp_id))
            .map_err(|_| PasskeyError::EmptyRelyingPartyId)?;

        WebauthnBuilder::new(rp_id, &origin)
            .and_then(|builder| builder.rp_name(rp_name).build())
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("webauthn setup failed: {e}")))
    }

    // ========================================================================
    // Registration ceremony
    // ========================================================================

    pub async fn start_registration(
        &self,
        req: &StartRegistrationRequest,
    ) -> Result<StartRegistrationResponse, PasskeyError> {
        if req.user_id.is_empty() {
            return Err(PasskeyError::EmptyUserIdentifier);
        }
        if req.relying_party_id.is_empty() {
            return Err(PasskeyError::EmptyRelyingPartyId);
        }

        let user = self
            .directory
            .get_user(&req.user_id)
            .await
            .map_err(map_directory_error)?;

        let document = self
            .directory
            .get_credentials(&req.user_id)
            .await
            .map_err(map_directory_error)?;
        let existing = document.decode_passkeys();

        let rp_name = req
            .relying_party_name
            .clone()
            .unwrap_or_else(|| req.relying_party_id.clone());
        let webauthn = self.build_webauthn(&req.relying_party_id, &rp_name)?;

        let (display_name, username) = extract_core_user(&user);
        let user_unique_id = user_uuid(&req.user_id);
        let exclude = if existing.is_empty() {
            None
        } else {
            Some(
                existing
                    .iter()
                    .map(|cred| cred.credential.cred_id().clone())
                    .collect(),
            )
        };

        let (mut options, registration_state) = webauthn
            .start_passkey_registration(user_unique_id, &username, &display_name, exclude)
            .map_err(|e| {
                PasskeyError::Internal(anyhow::anyhow!("registration options failed: {e}"))
            })?;

        // Forward the caller's authenticator preferences. Unknown enum
        // strings are dropped; user_verification defaults to preferred.
        if let Some(selection) = options.public_key.authenticator_selection.as_mut() {
            selection.authenticator_attachment =
                map_attachment(req.authenticator_attachment.as_deref());
            selection.require_resident_key =
                matches!(req.resident_key.as_deref(), Some("required"));
            selection.user_verification =
                map_user_verification(req.user_verification.as_deref());
        }
        if let Some(attestation) = map_attestation(req.attestation.as_deref()) {
            options.public_key.attestation = Some(attestation);
        }

        let session_token = Uuid::new_v4().to_string();
        let data = PasskeySessionData {
            relying_party_name: rp_name,
            ceremony: CeremonyState::Registration(registration_state),
        };
        self.sessions
            .store_session(
                &session_token,
                &req.user_id,
                &req.relying_party_id,
                &data,
                Utc::now() + self.session_validity,
            )
            .await
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("session store failed: {e}")))?;

        Ok(StartRegistrationResponse {
            session_token,
            public_key_credential_creation_options: options,
        })
    }

    pub async fn finish_registration(
        &self,
        req: &FinishRegistrationRequest,
    ) -> Result<FinishRegistrationResponse, PasskeyError> {
        if req.session_token.is_empty() {
            return Err(PasskeyError::EmptySessionToken);
        }
        if req.user_id.is_empty() {
            return Err(PasskeyError::EmptyUserIdentifier);
        }
        if req.relying_party_id.is_empty() {
            return Err(PasskeyError::EmptyRelyingPartyId);
        }
        if req.credential_id.is_empty() {
            return Err(PasskeyError::InvalidFinishData);
        }
        if req.client_data_json.is_empty() || req.attestation_object.is_empty() {
            return Err(PasskeyError::InvalidAuthenticatorResponse(
                "missing attestation fields".to_string(),
            ));
        }

        let session = self
            .sessions
            .retrieve_session(&req.session_token)
            .await
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("session lookup failed: {e}")))?
            .ok_or(PasskeyError::SessionExpired)?;

        // The session is one-shot: drop it whatever happens next.
        let result = self.finish_registration_with_session(req, session).await;
        if let Err(e) = self.sessions.delete_session(&req.session_token).await {
            tracing::warn!("failed to delete passkey session: {}", e);
        }
        result
    }

    async fn finish_registration_with_session(
        &self,
        req: &FinishRegistrationRequest,
        session: RetrievedSession,
    ) -> Result<FinishRegistrationResponse, PasskeyError> {
        let CeremonyState::Registration(registration_state) = session.data.ceremony else {
            return Err(PasskeyError::SessionExpired);
        };

        URL_SAFE_NO_PAD.decode(&req.credential_id).map_err(|_| {
            PasskeyError::InvalidAttestationResponse("failed to decode credential ID".to_string())
        })?;
        URL_SAFE_NO_PAD.decode(&req.client_data_json).map_err(|_| {
            PasskeyError::InvalidAttestationResponse(
                "failed to decode client data JSON".to_string(),
            )
        })?;
        URL_SAFE_NO_PAD.decode(&req.attestation_object).map_err(|_| {
            PasskeyError::InvalidAttestationResponse(
                "failed to decode attestation object".to_string(),
            )
        })?;

        let credential_type = if req.credential_type.is_empty() {
            "public-key"
        } else {
            &req.credential_type
        };
        let wire = json!({
            "id": req.credential_id,
            "rawId": req.credential_id,
            "response": {
                "attestationObject": req.attestation_object,
                "clientDataJSON": req.client_data_json,
            },
            "type": credential_type,
            "extensions": {},
        });
        let credential: RegisterPublicKeyCredential =
            serde_json::from_value(wire).map_err(|e| {
                PasskeyError::InvalidAttestationResponse(format!(
                    "failed to parse attestation response: {e}"
                ))
            })?;

        let webauthn =
            self.build_webauthn(&session.relying_party_id, &session.data.relying_party_name)?;
        let passkey = webauthn
            .finish_passkey_registration(&credential, &registration_state)
            .map_err(|e| {
                tracing::warn!("passkey registration rejected: {}", e);
                PasskeyError::InvalidAttestationResponse("failed to create credential".to_string())
            })?;

        let document = self
            .directory
            .get_credentials(&req.user_id)
            .await
            .map_err(map_directory_error)?;
        let mut credentials = document.decode_passkeys();

        if credentials.iter().any(|c| c.credential_id == req.credential_id) {
            return Err(PasskeyError::InvalidAttestationResponse(
                "credential already registered".to_string(),
            ));
        }

        credentials.push(StoredPasskeyCredential {
            credential_id: req.credential_id.clone(),
            sign_count: 0,
            clone_warning: false,
            attachment: req.authenticator_attachment.clone(),
            created_at: Utc::now(),
            last_used_at: None,
            credential: passkey,
        });

        let mut document = document;
        document
            .set_passkeys(&credentials)
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("credential encode failed: {e}")))?;
        self.directory
            .update_credentials(&req.user_id, &document)
            .await
            .map_err(map_directory_error)?;

        Ok(FinishRegistrationResponse {
            credential_id: req.credential_id.clone(),
        })
    }

    // ========================================================================
    // Authentication ceremony
    // ========================================================================

    pub async fn start_authentication(
        &self,
        req: &StartAuthenticationRequest,
    ) -> Result<StartAuthenticationResponse, PasskeyError> {
        if req.user_id.is_empty() {
            return Err(PasskeyError::EmptyUserIdentifier);
        }
        if req.relying_party_id.is_empty() {
            return Err(PasskeyError::EmptyRelyingPartyId);
        }

        self.directory
            .get_user(&req.user_id)
            .await
            .map_err(map_directory_error)?;

        let document = self
            .directory
            .get_credentials(&req.user_id)
            .await
            .map_err(map_directory_error)?;
        let credentials = document.decode_passkeys();
        if credentials.is_empty() {
            return Err(PasskeyError::NoCredentialsFound);
        }

        let webauthn = self.build_webauthn(&req.relying_party_id, &req.relying_party_id)?;
        let allowed: Vec<_> = credentials.iter().map(|c| c.credential.clone()).collect();

        let (mut options, authentication_state) = webauthn
            .start_passkey_authentication(&allowed)
            .map_err(|e| {
                PasskeyError::Internal(anyhow::anyhow!("authentication options failed: {e}"))
            })?;

        options.public_key.user_verification =
            map_user_verification(req.user_verification.as_deref());

        let session_token = Uuid::new_v4().to_string();
        let data = PasskeySessionData {
            relying_party_name: req.relying_party_id.clone(),
            ceremony: CeremonyState::Authentication(authentication_state),
        };
        self.sessions
            .store_session(
                &session_token,
                &req.user_id,
                &req.relying_party_id,
                &data,
                Utc::now() + self.session_validity,
            )
            .await
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("session store failed: {e}")))?;

        Ok(StartAuthenticationResponse {
            session_token,
            public_key_credential_request_options: options,
        })
    }

    pub async fn finish_authentication(
        &self,
        req: &FinishAuthenticationRequest,
    ) -> Result<FinishAuthenticationResponse, PasskeyError> {
        if req.session_token.is_empty() {
            return Err(PasskeyError::EmptySessionToken);
        }
        if req.user_id.is_empty() {
            return Err(PasskeyError::EmptyUserIdentifier);
        }
        if req.relying_party_id.is_empty() {
            return Err(PasskeyError::EmptyRelyingPartyId);
        }
        if req.credential_id.is_empty() {
            return Err(PasskeyError::EmptyCredentialId);
        }
        if req.client_data_json.is_empty()
            || req.authenticator_data.is_empty()
            || req.signature.is_empty()
        {
            return Err(PasskeyError::InvalidAuthenticatorResponse(
                "missing assertion fields".to_string(),
            ));
        }

        let session = self
            .sessions
            .retrieve_session(&req.session_token)
            .await
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("session lookup failed: {e}")))?
            .ok_or(PasskeyError::SessionExpired)?;

        // Clear the session regardless of the outcome.
        let result = self.finish_authentication_with_session(req, session).await;
        if let Err(e) = self.sessions.delete_session(&req.session_token).await {
            tracing::warn!("failed to delete passkey session: {}", e);
        }
        result
    }

    async fn finish_authentication_with_session(
        &self,
        req: &FinishAuthenticationRequest,
        session: RetrievedSession,
    ) -> Result<FinishAuthenticationResponse, PasskeyError> {
        let CeremonyState::Authentication(authentication_state) = session.data.ceremony else {
            return Err(PasskeyError::SessionExpired);
        };

        for (value, label) in [
            (&req.credential_id, "credential ID"),
            (&req.client_data_json, "client data JSON"),
            (&req.authenticator_data, "authenticator data"),
            (&req.signature, "signature"),
        ] {
            URL_SAFE_NO_PAD.decode(value).map_err(|_| {
                PasskeyError::InvalidAuthenticatorResponse(format!("failed to decode {label}"))
            })?;
        }

        // A malformed user handle is tolerated; the library accepts its
        // absence.
        let user_handle = req
            .user_handle
            .as_deref()
            .filter(|handle| URL_SAFE_NO_PAD.decode(handle).is_ok());

        let user = self
            .directory
            .get_user(&req.user_id)
            .await
            .map_err(map_directory_error)?;

        let document = self
            .directory
            .get_credentials(&req.user_id)
            .await
            .map_err(map_directory_error)?;
        let mut credentials = document.decode_passkeys();
        if credentials.is_empty() {
            return Err(PasskeyError::NoCredentialsFound);
        }

        let wire = json!({
            "id": req.credential_id,
            "rawId": req.credential_id,
            "response": {
                "authenticatorData": req.authenticator_data,
                "clientDataJSON": req.client_data_json,
                "signature": req.signature,
                "userHandle": user_handle,
            },
            "type": "public-key",
            "extensions": {},
        });
        let credential: PublicKeyCredential = serde_json::from_value(wire).map_err(|e| {
            PasskeyError::InvalidAuthenticatorResponse(format!(
                "failed to parse assertion response: {e}"
            ))
        })?;

        let webauthn =
            self.build_webauthn(&session.relying_party_id, &session.data.relying_party_name)?;
        let auth_result = webauthn
            .finish_passkey_authentication(&credential, &authentication_state)
            .map_err(|e| {
                tracing::warn!("passkey assertion rejected: {}", e);
                PasskeyError::InvalidSignature
            })?;

        // Bump the signature counter on the matching credential. The
        // stored counter never decreases; a regression is latched and
        // logged as a clone warning.
        let now = Utc::now();
        let mut updated = false;
        for stored in credentials.iter_mut() {
            if stored.credential.update_credential(&auth_result).is_some() {
                let observed = auth_result.counter();
                if stored.sign_count > 0 && observed > 0 && observed < stored.sign_count {
                    tracing::warn!(
                        credential_id = %stored.credential_id,
                        stored_count = stored.sign_count,
                        observed_count = observed,
                        "sign count regression: possible credential clone"
                    );
                    stored.clone_warning = true;
                }
                stored.sign_count = observed.max(stored.sign_count);
                stored.last_used_at = Some(now);
                updated = true;
                break;
            }
        }

        if !updated {
            return Err(PasskeyError::Internal(anyhow::anyhow!(
                "authenticated credential not found in credential document"
            )));
        }

        let mut document = document;
        document
            .set_passkeys(&credentials)
            .map_err(|e| PasskeyError::Internal(anyhow::anyhow!("credential encode failed: {e}")))?;
        self.directory
            .update_credentials(&req.user_id, &document)
            .await
            .map_err(map_directory_error)?;

        let (display_name, username) = extract_core_user(&user);
        Ok(FinishAuthenticationResponse {
            user_id: req.user_id.clone(),
            display_name,
            username,
        })
    }
}

/// Map directory failures: a missing user is the caller's problem,
/// anything else is internal.
fn map_directory_error(e: DirectoryError) -> PasskeyError {
    match e {
        DirectoryError::UserNotFound => PasskeyError::UserNotFound,
        other => PasskeyError::Internal(anyhow::anyhow!("directory error: {other}")),
    }
}

/// Resolve the WebAuthn user handle for a directory user id: native UUIDs
/// pass through, anything else maps to a deterministic v5 UUID.
fn user_uuid(user_id: &str) -> Uuid {
    Uuid::parse_str(user_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, user_id.as_bytes()))
}

/// Resolve display name and username from directory attributes: name from
/// firstName/lastName, username from username, then email, both falling
/// back to the user id.
fn extract_core_user(user: &DirectoryUser) -> (String, String) {
    let first = user.attribute("firstName");
    let last = user.attribute("lastName");
    let display_name = match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{first} {last}"),
        (false, true) => first.to_string(),
        (true, false) => last.to_string(),
        (true, true) => user.id.clone(),
    };

    let username = [user.attribute("username"), user.attribute("email")]
        .into_iter()
        .find(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| user.id.clone());

    (display_name, username)
}

fn map_attachment(value: Option<&str>) -> Option<AuthenticatorAttachment> {
    match value {
        Some("platform") => Some(AuthenticatorAttachment::Platform),
        Some("cross-platform") => Some(AuthenticatorAttachment::CrossPlatform),
        _ => None,
    }
}

fn map_user_verification(value: Option<&str>) -> UserVerificationPolicy {
    match value {
        Some("required") => UserVerificationPolicy::Required,
        Some("discouraged") => UserVerificationPolicy::Discouraged_DO_NOT_USE,
        _ => UserVerificationPolicy::Preferred,
    }
}

fn map_attestation(value: Option<&str>) -> Option<AttestationConveyancePreference> {
    match value {
        Some("none") => Some(AttestationConveyancePreference::None),
        Some("indirect") => Some(AttestationConveyancePreference::Indirect),
        Some("direct") => Some(AttestationConveyancePreference::Direct),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryPasskeySessionStore;
    use crate::test_support::MockDirectory;

    fn service() -> PasskeyService {
        PasskeyService::new(
            Arc::new(MemoryPasskeySessionStore::new()),
            Arc::new(MockDirectory::with_user("user123")),
            "https".to_string(),
            300,
        )
    }

    fn start_request() -> StartRegistrationRequest {
        StartRegistrationRequest {
            user_id: "user123".to_string(),
            relying_party_id: "example.com".to_string(),
            relying_party_name: Some("Example".to_string()),
            authenticator_attachment: None,
            resident_key: None,
            user_verification: None,
            attestation: Some("none".to_string()),
        }
    }

    #[tokio::test]
    async fn test_start_registration_returns_options_and_token() {
        let service = service();
        let response = service.start_registration(&start_request()).await.unwrap();

        assert!(Uuid::parse_str(&response.session_token).is_ok());
        let options =
            serde_json::to_value(&response.public_key_credential_creation_options).unwrap();
        assert_eq!(options["publicKey"]["rp"]["id"], "example.com");
        assert_eq!(options["publicKey"]["rp"]["name"], "Example");
        assert!(!options["publicKey"]["challenge"].as_str().unwrap().is_empty());
        assert!(!options["publicKey"]["user"]["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_registration_validation() {
        let service = service();

        let mut req = start_request();
        req.user_id = String::new();
        assert!(matches!(
            service.start_registration(&req).await.unwrap_err(),
            PasskeyError::EmptyUserIdentifier
        ));

        let mut req = start_request();
        req.relying_party_id = String::new();
        assert!(matches!(
            service.start_registration(&req).await.unwrap_err(),
            PasskeyError::EmptyRelyingPartyId
        ));

        let mut req = start_request();
        req.user_id = "ghost".to_string();
        assert!(matches!(
            service.start_registration(&req).await.unwrap_err(),
            PasskeyError::UserNotFound
        ));
    }

    #[tokio::test]
    async fn test_session_state_round_trips_through_json() {
        // The ceremony state must survive the DB JSON column
        let service = service();
        let response = service.start_registration(&start_request()).await.unwrap();

        let retrieved = service
            .sessions
            .retrieve_session(&response.session_token)
            .await
            .unwrap()
            .unwrap();

        let encoded = serde_json::to_value(&retrieved.data).unwrap();
        let decoded: PasskeySessionData = serde_json::from_value(encoded).unwrap();
        assert!(matches!(decoded.ceremony, CeremonyState::Registration(_)));
        assert_eq!(decoded.relying_party_name, "Example");
    }

    #[tokio::test]
    async fn test_finish_registration_validation() {
        let service = service();

        let empty = FinishRegistrationRequest {
            session_token: String::new(),
            user_id: "user123".to_string(),
            relying_party_id: "example.com".to_string(),
            credential_id: "Y3JlZDE".to_string(),
            credential_type: "public-key".to_string(),
            client_data_json: "e30".to_string(),
            attestation_object: "AAAA".to_string(),
            transports: None,
            authenticator_attachment: None,
        };
        assert!(matches!(
            service.finish_registration(&empty).await.unwrap_err(),
            PasskeyError::EmptySessionToken
        ));

        let mut req = empty.clone();
        req.session_token = "tok".to_string();
        req.credential_id = String::new();
        assert!(matches!(
            service.finish_registration(&req).await.unwrap_err(),
            PasskeyError::InvalidFinishData
        ));

        let mut req = empty.clone();
        req.session_token = "tok".to_string();
        req.client_data_json = String::new();
        assert!(matches!(
            service.finish_registration(&req).await.unwrap_err(),
            PasskeyError::InvalidAuthenticatorResponse(_)
        ));

        // Unknown token: the session is gone or never existed
        let mut req = empty;
        req.session_token = "unknown".to_string();
        assert!(matches!(
            service.finish_registration(&req).await.unwrap_err(),
            PasskeyError::SessionExpired
        ));
    }

    #[tokio::test]
    async fn test_finish_registration_bad_encoding_consumes_session() {
        let service = service();
        let started = service.start_registration(&start_request()).await.unwrap();

        let req = FinishRegistrationRequest {
            session_token: started.session_token.clone(),
            user_id: "user123".to_string(),
            relying_party_id: "example.com".to_string(),
            credential_id: "not base64url!!".to_string(),
            credential_type: "public-key".to_string(),
            client_data_json: "e30".to_string(),
            attestation_object: "AAAA".to_string(),
            transports: None,
            authenticator_attachment: None,
        };

        let err = service.finish_registration(&req).await.unwrap_err();
        match err {
            PasskeyError::InvalidAttestationResponse(descriptor) => {
                assert!(descriptor.contains("credential ID"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failed finish still consumed the session
        let replay = service.finish_registration(&req).await.unwrap_err();
        assert!(matches!(replay, PasskeyError::SessionExpired));
    }

    #[tokio::test]
    async fn test_start_authentication_without_credentials() {
        let service = service();
        let req = StartAuthenticationRequest {
            user_id: "user123".to_string(),
            relying_party_id: "example.com".to_string(),
            user_verification: None,
        };
        assert!(matches!(
            service.start_authentication(&req).await.unwrap_err(),
            PasskeyError::NoCredentialsFound
        ));
    }

    #[tokio::test]
    async fn test_finish_authentication_validation() {
        let service = service();

        let base = FinishAuthenticationRequest {
            session_token: "tok".to_string(),
            user_id: "user123".to_string(),
            relying_party_id: "example.com".to_string(),
            credential_id: "Y3JlZDE".to_string(),
            client_data_json: "e30".to_string(),
            authenticator_data: "AAAA".to_string(),
            signature: "BBBB".to_string(),
            user_handle: None,
        };

        let mut req = base.clone();
        req.credential_id = String::new();
        assert!(matches!(
            service.finish_authentication(&req).await.unwrap_err(),
            PasskeyError::EmptyCredentialId
        ));

        let mut req = base.clone();
        req.signature = String::new();
        assert!(matches!(
            service.finish_authentication(&req).await.unwrap_err(),
            PasskeyError::InvalidAuthenticatorResponse(_)
        ));

        let mut req = base.clone();
        req.relying_party_id = String::new();
        assert!(matches!(
            service.finish_authentication(&req).await.unwrap_err(),
            PasskeyError::EmptyRelyingPartyId
        ));

        // A valid shape with an unknown token reads as expired
        assert!(matches!(
            service.finish_authentication(&base).await.unwrap_err(),
            PasskeyError::SessionExpired
        ));
    }

    #[test]
    fn test_extract_core_user_fallbacks() {
        let mut user = DirectoryUser::default();
        user.id = "user123".to_string();

        // No attributes at all: both fall back to the user id
        assert_eq!(extract_core_user(&user), ("user123".to_string(), "user123".to_string()));

        // Email only: username comes from email
        user.attributes = serde_json::json!({"email": "a@example.com"})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(extract_core_user(&user).1, "a@example.com");

        // First name only
        user.attributes = serde_json::json!({"firstName": "Alice"})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(extract_core_user(&user).0, "Alice");

        // Full name
        user.attributes = serde_json::json!({"firstName": "Alice", "lastName": "Doe"})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(extract_core_user(&user).0, "Alice Doe");
    }

    #[test]
    fn test_user_uuid_is_stable() {
        assert_eq!(user_uuid("user123"), user_uuid("user123"));
        assert_ne!(user_uuid("user123"), user_uuid("user124"));

        let native = Uuid::new_v4();
        assert_eq!(user_uuid(&native.to_string()), native);
    }

    #[test]
    fn test_authenticator_selection_mapping() {
        assert_eq!(map_attachment(Some("platform")), Some(AuthenticatorAttachment::Platform));
        assert_eq!(
            map_attachment(Some("cross-platform")),
            Some(AuthenticatorAttachment::CrossPlatform)
        );
        // Unknown and empty values are dropped
        assert_eq!(map_attachment(Some("hybrid")), None);
        assert_eq!(map_attachment(None), None);

        assert_eq!(map_user_verification(Some("required")), UserVerificationPolicy::Required);
        assert_eq!(
            map_user_verification(Some("discouraged")),
            UserVerificationPolicy::Discouraged_DO_NOT_USE
        );
        // user_verification defaults to preferred rather than dropping
        assert_eq!(map_user_verification(None), UserVerificationPolicy::Preferred);
        assert_eq!(map_user_verification(Some("bogus")), UserVerificationPolicy::Preferred);

        assert!(matches!(map_attestation(Some("none")), Some(AttestationConveyancePreference::None)));
        assert!(matches!(map_attestation(Some("direct")), Some(AttestationConveyancePreference::Direct)));
        assert!(matches!(map_attestation(Some("enterprise")), None));
    }
}
