//! Scope parsing for the authorization endpoint
//!
//! Splits a space-delimited `scope` parameter into OIDC-recognized scopes
//! and the remaining permission scopes, preserving insertion order.

/// The OIDC-reserved scopes treated as "standard" by the scope split.
pub const OIDC_SCOPES: [&str; 5] = ["openid", "profile", "email", "address", "phone"];

/// Check whether a scope is one of the OIDC-reserved scopes.
pub fn is_oidc_scope(scope: &str) -> bool {
    OIDC_SCOPES.contains(&scope)
}

/// Split a raw space-delimited scope string into `(standard, permission)`
/// vectors, both in insertion order.
pub fn split_scopes(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut standard = Vec::new();
    let mut permission = Vec::new();

    for scope in raw.split_whitespace() {
        if is_oidc_scope(scope) {
            standard.push(scope.to_string());
        } else {
            permission.push(scope.to_string());
        }
    }

    (standard, permission)
}

/// Join standard and permission scopes back into a single space-delimited
/// string, standard scopes first, insertion order preserved.
pub fn join_scopes(standard: &[String], permission: &[String]) -> String {
    standard
        .iter()
        .chain(permission.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_preserves_order() {
        let (standard, permission) = split_scopes("openid profile read write");
        assert_eq!(standard, vec!["openid", "profile"]);
        assert_eq!(permission, vec!["read", "write"]);
    }

    #[test]
    fn test_split_interleaved() {
        let (standard, permission) = split_scopes("read openid write email admin");
        assert_eq!(standard, vec!["openid", "email"]);
        assert_eq!(permission, vec!["read", "write", "admin"]);
    }

    #[test]
    fn test_split_empty() {
        let (standard, permission) = split_scopes("");
        assert!(standard.is_empty());
        assert!(permission.is_empty());

        let (standard, permission) = split_scopes("   ");
        assert!(standard.is_empty());
        assert!(permission.is_empty());
    }

    #[test]
    fn test_custom_scopes_are_permissions() {
        // Custom claim-derived scopes are not classified as standard
        let (standard, permission) = split_scopes("groups roles");
        assert!(standard.is_empty());
        assert_eq!(permission, vec!["groups", "roles"]);
    }

    #[test]
    fn test_join_scopes() {
        let standard = vec!["openid".to_string(), "profile".to_string()];
        let permission = vec!["read".to_string(), "write".to_string()];
        assert_eq!(join_scopes(&standard, &permission), "openid profile read write");
        assert_eq!(join_scopes(&[], &[]), "");
    }
}
