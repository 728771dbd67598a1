use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::AssertionError;

/// Claims the flow engine puts in the authentication assertion that
/// carry optional display information about the authenticated user.
const DISPLAY_CLAIMS: [&str; 5] = [
    "username",
    "email",
    "firstName",
    "lastName",
    "authorized_permissions",
];

/// Decoded claims of a flow-engine assertion.
///
/// `sub` is the only required claim; everything else is optional. A claim
/// that is present with a non-string value fails the decode outright.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionClaims {
    pub user_id: String,
    pub user_type: String,
    pub ou_id: String,
    pub ou_name: String,
    pub ou_handle: String,
    /// `iat`, when present; callers fall back to the wall clock
    pub auth_time: Option<DateTime<Utc>>,
    pub display: HashMap<String, String>,
}

impl AssertionClaims {
    /// Decode the raw claims map produced by assertion verification.
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self, AssertionError> {
        let user_id = required_string_claim(claims, "sub")?;
        let user_type = optional_string_claim(claims, "userType")?;
        let ou_id = optional_string_claim(claims, "ouId")?;
        let ou_name = optional_string_claim(claims, "ouName")?;
        let ou_handle = optional_string_claim(claims, "ouHandle")?;

        let auth_time = match claims.get("iat") {
            Some(value) => match value.as_i64() {
                Some(secs) => Some(
                    Utc.timestamp_opt(secs, 0)
                        .single()
                        .ok_or_else(|| AssertionError::InvalidClaims("iat out of range".to_string()))?,
                ),
                None => {
                    return Err(AssertionError::InvalidClaims(
                        "iat claim is not numeric".to_string(),
                    ))
                }
            },
            None => None,
        };

        let mut display = HashMap::new();
        for name in DISPLAY_CLAIMS {
            let value = optional_string_claim(claims, name)?;
            if !value.is_empty() {
                display.insert(name.to_string(), value);
            }
        }

        Ok(Self {
            user_id,
            user_type,
            ou_id,
            ou_name,
            ou_handle,
            auth_time,
            display,
        })
    }

    /// The `authorized_permissions` claim, space-split.
    pub fn authorized_permissions(&self) -> Vec<String> {
        self.display
            .get("authorized_permissions")
            .map(|p| p.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// The authentication time, falling back to `now`.
    pub fn auth_time_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.auth_time.unwrap_or(now)
    }
}

/// A claim that must be a string when present; absence yields an empty
/// string (the caller decides whether that is fatal).
fn optional_string_claim(claims: &Map<String, Value>, name: &str) -> Result<String, AssertionError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(AssertionError::InvalidClaims(format!(
            "claim {name} is not a string"
        ))),
    }
}

fn required_string_claim(claims: &Map<String, Value>, name: &str) -> Result<String, AssertionError> {
    match claims.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(AssertionError::InvalidClaims(format!(
            "claim {name} is not a string"
        ))),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_minimal_assertion_accepted() {
        // An assertion whose only claim is sub must decode
        let decoded = AssertionClaims::from_claims(&claims(json!({"sub": "alice"}))).unwrap();
        assert_eq!(decoded.user_id, "alice");
        assert!(decoded.auth_time.is_none());
        assert!(decoded.display.is_empty());
        assert!(decoded.authorized_permissions().is_empty());
    }

    #[test]
    fn test_full_assertion() {
        let decoded = AssertionClaims::from_claims(&claims(json!({
            "sub": "alice",
            "userType": "person",
            "ouId": "ou-1",
            "ouName": "Engineering",
            "ouHandle": "eng",
            "iat": 1767225600,
            "username": "alice",
            "email": "alice@example.com",
            "firstName": "Alice",
            "lastName": "Doe",
            "authorized_permissions": "read write"
        })))
        .unwrap();

        assert_eq!(decoded.user_type, "person");
        assert_eq!(decoded.ou_handle, "eng");
        assert_eq!(decoded.auth_time.unwrap().timestamp(), 1767225600);
        assert_eq!(decoded.display.get("email").unwrap(), "alice@example.com");
        assert_eq!(decoded.authorized_permissions(), vec!["read", "write"]);
    }

    #[test]
    fn test_non_string_claim_is_hard_failure() {
        assert!(AssertionClaims::from_claims(&claims(json!({"sub": 42}))).is_err());
        assert!(AssertionClaims::from_claims(&claims(json!({
            "sub": "alice",
            "username": ["a"]
        })))
        .is_err());
        assert!(AssertionClaims::from_claims(&claims(json!({
            "sub": "alice",
            "ouName": {"x": 1}
        })))
        .is_err());
    }

    #[test]
    fn test_non_numeric_iat_rejected() {
        assert!(AssertionClaims::from_claims(&claims(json!({
            "sub": "alice",
            "iat": "yesterday"
        })))
        .is_err());
    }

    #[test]
    fn test_missing_sub_yields_empty_user_id() {
        // The decode succeeds; the handler rejects the empty userID
        let decoded = AssertionClaims::from_claims(&claims(json!({"userType": "person"}))).unwrap();
        assert!(decoded.user_id.is_empty());
    }

    #[test]
    fn test_auth_time_fallback() {
        let now = Utc::now();
        let decoded = AssertionClaims::from_claims(&claims(json!({"sub": "alice"}))).unwrap();
        assert_eq!(decoded.auth_time_or(now), now);
    }
}
