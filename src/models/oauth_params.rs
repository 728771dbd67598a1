use serde::{Deserialize, Deserializer, Serialize};

/// The parameters of an in-flight authorization request.
///
/// This is the shape persisted as `REQUEST_DATA` by the auth-request
/// store and round-tripped across the user-authentication redirect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthParameters {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub response_type: String,
    #[serde(default, deserialize_with = "lenient_string_vec")]
    pub standard_scopes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_vec")]
    pub permission_scopes: Vec<String>,
    #[serde(default)]
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: String,
    #[serde(default)]
    pub resource: String,
}

/// Decode a JSON value into a string vector, falling back to an empty
/// vector on any type mismatch instead of failing the whole row.
fn lenient_string_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let scopes = match value {
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_json::Value::String(s) => out.push(s),
                    _ => return Ok(Vec::new()),
                }
            }
            out
        }
        _ => Vec::new(),
    };
    Ok(scopes)
}

impl OAuthParameters {
    /// All requested scopes, standard first, insertion order preserved.
    pub fn all_scopes(&self) -> Vec<String> {
        self.standard_scopes
            .iter()
            .chain(self.permission_scopes.iter())
            .cloned()
            .collect()
    }
}
