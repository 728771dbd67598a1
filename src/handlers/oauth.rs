//! Authorization endpoint handlers
//!
//! `GET /oauth2/authorize` runs the initial leg and always answers with a
//! redirect (login page, error page or client redirect). `POST
//! /oauth2/authorize` consumes the flow engine's assertion and answers
//! 200 with the redirect target in the JSON body; only a malformed body
//! yields a non-200 status.

use axum::{
    extract::{rejection::JsonRejection, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};

use crate::config::AppState;
use crate::dto::{EngineResponseRequest, OAuthMessage};
use crate::error::OAuthError;
use crate::services::{AuthorizationService, AuthorizeOutcome};

/// GET /oauth2/authorize - initial authorization request
pub async fn authorize_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let pairs: Vec<(String, String)> = query
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let msg = OAuthMessage::initial(pairs);
    let service = AuthorizationService::from_state(&state);

    match service.process(&msg).await {
        AuthorizeOutcome::Redirect(location) => Redirect::temporary(&location).into_response(),
        AuthorizeOutcome::Finish(body) => Json(body).into_response(),
        AuthorizeOutcome::BadRequest(description) => {
            OAuthError::InvalidRequest(description.to_string()).into_response()
        }
    }
}

/// POST /oauth2/authorize - engine-response leg
pub async fn authorize_finish_handler(
    State(state): State<AppState>,
    payload: Result<Json<EngineResponseRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(_) => {
            return OAuthError::InvalidRequest("Malformed request body".to_string())
                .into_response()
        }
    };

    let msg = OAuthMessage::engine_response(body.auth_id, body.assertion);
    let service = AuthorizationService::from_state(&state);

    match service.process(&msg).await {
        AuthorizeOutcome::Finish(response) => (StatusCode::OK, Json(response)).into_response(),
        AuthorizeOutcome::Redirect(location) => Redirect::temporary(&location).into_response(),
        AuthorizeOutcome::BadRequest(description) => {
            OAuthError::InvalidRequest(description.to_string()).into_response()
        }
    }
}

/// OPTIONS /oauth2/authorize - CORS preflight
pub async fn authorize_options_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use crate::dto::AuthorizeFinishResponse;
    use crate::test_support::{test_app, test_state};
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_authorize_happy_path_end_to_end() {
        let router = create_router(test_state(test_app()));

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/oauth2/authorize?client_id=test-client-id&redirect_uri=https%3A%2F%2Fclient.example.com%2Fcallback&response_type=code&scope=openid%20profile%20read%20write&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let login = location(&response);
        assert!(login.starts_with("https://gate.example.com:9001/login?authId="));
        assert!(login.contains("appId=test-app-id"));
        assert!(login.contains("flowId=flow-1"));

        let auth_id = url::Url::parse(&login)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "authId")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/oauth2/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"authId":"{auth_id}","assertion":"assertion-jwt"}}"#
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: AuthorizeFinishResponse = body_json(response).await;
        assert!(body
            .redirect_uri
            .starts_with("https://client.example.com/callback?code="));
        assert!(body.redirect_uri.contains("state=xyz"));
    }

    #[tokio::test]
    async fn test_authorize_error_redirects_to_client() {
        let router = create_router(test_state(test_app()));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/oauth2/authorize?client_id=test-client-id&redirect_uri=https%3A%2F%2Fclient.example.com%2Fcallback&response_type=token&state=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(target.starts_with("https://client.example.com/callback?error=unsupported_response_type"));
        assert!(target.contains("state=xyz"));
    }

    #[tokio::test]
    async fn test_authorize_finish_malformed_body_is_invalid_request() {
        let router = create_router(test_state(test_app()));

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/oauth2/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"authId":"only-an-id"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_authorize_cors_preflight() {
        let router = create_router(test_state(test_app()));

        // A browser preflight is answered by the CORS layer itself
        let response = router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/oauth2/authorize")
                    .header(header::ORIGIN, "https://client.example.com")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-credentials")
                .unwrap(),
            "true"
        );
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "https://client.example.com"
        );
    }

    #[tokio::test]
    async fn test_authorize_plain_options() {
        let router = create_router(test_state(test_app()));

        // A bare OPTIONS (no preflight headers) reaches the handler
        let response = router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/oauth2/authorize")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_auth_id_returns_error_page_in_body() {
        let router = create_router(test_state(test_app()));

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/oauth2/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"authId":"missing","assertion":"jwt"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        // The POST leg reports failures inside a 200 body
        assert_eq!(response.status(), StatusCode::OK);
        let body: AuthorizeFinishResponse = body_json(response).await;
        assert!(body.redirect_uri.starts_with("https://gate.example.com:9001/error?"));
    }
}
