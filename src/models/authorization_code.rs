use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Lifecycle state of an authorization code.
///
/// `Active` is the only redeemable state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeState {
    Active,
    Inactive,
    Revoked,
    Expired,
}

impl CodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeState::Active => "ACTIVE",
            CodeState::Inactive => "INACTIVE",
            CodeState::Revoked => "REVOKED",
            CodeState::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "ACTIVE" => Ok(CodeState::Active),
            "INACTIVE" => Ok(CodeState::Inactive),
            "REVOKED" => Ok(CodeState::Revoked),
            "EXPIRED" => Ok(CodeState::Expired),
            other => Err(StoreError::CorruptRow(format!("unknown code state: {other}"))),
        }
    }
}

/// The JSON side data persisted with an authorization code in the
/// `AUTHZ_DATA` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthzData {
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub authorized_user_id: String,
    #[serde(default)]
    pub scopes: String,
    #[serde(default)]
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub authorized_user_type: String,
    #[serde(default)]
    pub user_ou_id: String,
    #[serde(default)]
    pub user_ou_name: String,
    #[serde(default)]
    pub user_ou_handle: String,
}

/// An issued authorization code.
///
/// `(client_id, code)` is unique; only an `ACTIVE` code is redeemable and
/// every redemption transitions the code to `INACTIVE` before a token is
/// emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code_id: Uuid,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub authorized_user_id: String,
    pub authorized_user_type: String,
    pub user_ou_id: String,
    pub user_ou_name: String,
    pub user_ou_handle: String,
    /// Space-joined union of standard and permission scopes
    pub scopes: String,
    pub time_created: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub state: CodeState,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub resource: String,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time <= now
    }

    /// Extract the JSON side data for persistence
    pub fn authz_data(&self) -> AuthzData {
        AuthzData {
            redirect_uri: self.redirect_uri.clone(),
            authorized_user_id: self.authorized_user_id.clone(),
            scopes: self.scopes.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            resource: self.resource.clone(),
            authorized_user_type: self.authorized_user_type.clone(),
            user_ou_id: self.user_ou_id.clone(),
            user_ou_name: self.user_ou_name.clone(),
            user_ou_handle: self.user_ou_handle.clone(),
        }
    }

    /// Rebuild a code from top-level columns plus decoded side data
    pub fn from_parts(
        code_id: Uuid,
        code: String,
        client_id: String,
        state: CodeState,
        time_created: DateTime<Utc>,
        expiry_time: DateTime<Utc>,
        data: AuthzData,
    ) -> Self {
        Self {
            code_id,
            code,
            client_id,
            redirect_uri: data.redirect_uri,
            authorized_user_id: data.authorized_user_id,
            authorized_user_type: data.authorized_user_type,
            user_ou_id: data.user_ou_id,
            user_ou_name: data.user_ou_name,
            user_ou_handle: data.user_ou_handle,
            scopes: data.scopes,
            time_created,
            expiry_time,
            state,
            code_challenge: data.code_challenge,
            code_challenge_method: data.code_challenge_method,
            resource: data.resource,
        }
    }
}

/// Format a timestamp for the string-typed time columns. The fixed-width
/// format keeps lexicographic order chronological, so SQL range
/// comparisons on the column stay correct.
pub fn format_db_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse a time column leniently.
///
/// First attempt `YYYY-MM-DD HH:MM:SS.fff…`, trimming the value to its
/// first two whitespace-delimited tokens (drivers sometimes append a
/// zone suffix); fall back to RFC 3339.
pub fn parse_db_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    let mut tokens = value.split_whitespace();
    let trimmed = match (tokens.next(), tokens.next()) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        (Some(date), None) => date.to_string(),
        _ => String::new(),
    };

    if let Ok(naive) = NaiveDateTime::parse_from_str(&trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::CorruptRow(format!("unparseable time value: {value}")))
}
