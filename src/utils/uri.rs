//! URI composition and validation helpers
//!
//! Builds client/error-page/login-page redirect URIs and validates the
//! RFC 8707 `resource` parameter.

use url::Url;

/// Append a query parameter to a URL string, using `?` or `&` as needed.
///
/// Values are percent-encoded; keys are passed through verbatim.
pub fn append_query_param(url: &mut String, key: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(key);
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}

/// Build a client redirect URI carrying an RFC 6749 error response.
///
/// `state` is echoed only when present and non-empty.
pub fn compose_error_redirect(
    redirect_uri: &str,
    error: &str,
    description: &str,
    state: Option<&str>,
) -> String {
    let mut url = redirect_uri.to_string();
    append_query_param(&mut url, "error", error);
    append_query_param(&mut url, "error_description", description);
    if let Some(s) = state {
        if !s.is_empty() {
            append_query_param(&mut url, "state", s);
        }
    }
    url
}

/// Build the client redirect URI carrying an authorization code.
pub fn compose_code_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    let mut url = redirect_uri.to_string();
    append_query_param(&mut url, "code", code);
    if let Some(s) = state {
        if !s.is_empty() {
            append_query_param(&mut url, "state", s);
        }
    }
    url
}

/// Validate an RFC 8707 resource indicator.
///
/// The resource must parse as an absolute URI and must not carry a
/// fragment component. A query component is allowed. Returns a
/// human-readable description of the violation on failure.
pub fn validate_resource_uri(resource: &str) -> Result<(), &'static str> {
    let parsed = match Url::parse(resource) {
        Ok(u) => u,
        // Url::parse only accepts absolute URIs; a relative reference
        // fails with RelativeUrlWithoutBase
        Err(_) => return Err("resource must be a valid absolute URI"),
    };

    if parsed.scheme().is_empty() {
        return Err("resource must be a valid absolute URI");
    }

    if parsed.fragment().is_some() {
        return Err("resource must not contain a fragment component");
    }

    Ok(())
}

/// Return the scheme of a URI, or an empty string if it does not parse.
pub fn uri_scheme(uri: &str) -> String {
    Url::parse(uri)
        .map(|u| u.scheme().to_string())
        .unwrap_or_default()
}
