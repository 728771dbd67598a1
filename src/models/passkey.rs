use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use webauthn_rs::prelude::{Passkey, PasskeyAuthentication, PasskeyRegistration};

/// Bucket key under which passkey credentials live inside a user's
/// credential document in the directory.
pub const PASSKEY_BUCKET: &str = "passkey";

/// A passkey credential persisted in the directory.
///
/// Wraps the library credential with the bookkeeping the directory
/// document carries: the base64url credential id (unique per user), the
/// last observed signature counter (monotonically non-decreasing) and a
/// clone-warning flag latched when a counter regression was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPasskeyCredential {
    pub credential_id: String,
    pub sign_count: u32,
    #[serde(default)]
    pub clone_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub credential: Passkey,
}

/// A user's credential document as stored by the directory service.
///
/// The document is a map of credential buckets. Only the `"passkey"`
/// bucket is interpreted here; all other buckets pass through verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialDocument(pub Map<String, Value>);

impl CredentialDocument {
    /// Decode the passkey bucket tolerantly: individual malformed rows
    /// are skipped, never fatal.
    pub fn decode_passkeys(&self) -> Vec<StoredPasskeyCredential> {
        let Some(Value::Array(entries)) = self.0.get(PASSKEY_BUCKET) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                match serde_json::from_value::<StoredPasskeyCredential>(entry.clone()) {
                    Ok(cred) => Some(cred),
                    Err(e) => {
                        tracing::warn!("skipping malformed passkey credential: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Replace the passkey bucket, leaving every other bucket untouched.
    pub fn set_passkeys(
        &mut self,
        credentials: &[StoredPasskeyCredential],
    ) -> Result<(), serde_json::Error> {
        let encoded = credentials
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.0.insert(PASSKEY_BUCKET.to_string(), Value::Array(encoded));
        Ok(())
    }
}

/// Server-side state of an in-flight WebAuthn ceremony, persisted as the
/// `DATA` column of a passkey session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeySessionData {
    pub relying_party_name: String,
    pub ceremony: CeremonyState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "snake_case")]
pub enum CeremonyState {
    Registration(PasskeyRegistration),
    Authentication(PasskeyAuthentication),
}
