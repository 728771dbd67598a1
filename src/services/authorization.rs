//! Authorization-code flow orchestration
//!
//! Drives the two-leg authorization-code flow: the initial GET leg
//! validates the request, initiates an authentication flow and parks the
//! request context behind an opaque handle; the POST leg consumes the
//! flow engine's signed assertion and mints the authorization code.
//!
//! Every outcome is a redirect target. The initial leg answers with a
//! redirect; the engine leg answers 200 with the target in the JSON body
//! because the caller is the front-channel client, not the browser.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AppState, Config};
use crate::dto::{AuthorizeFinishResponse, OAuthMessage, OAuthRequestType};
use crate::external::{ApplicationRegistry, AssertionVerifier, FlowEngine, FlowInitRequest};
use crate::models::{
    AssertionClaims, AuthorizationCode, CodeState, OAuthApplication, OAuthParameters,
};
use crate::repositories::{AuthRequestStore, AuthorizationCodeStore};
use crate::services::validation::validate_initial_authorization_request;
use crate::utils::scope::{join_scopes, split_scopes};
use crate::utils::uri::{
    append_query_param, compose_code_redirect, compose_error_redirect, uri_scheme,
};

/// Outcome of processing an authorization-endpoint message.
pub enum AuthorizeOutcome {
    /// Redirect to the given target (initial leg)
    Redirect(String),
    /// 200 with the JSON body carrying the redirect target (engine leg)
    Finish(AuthorizeFinishResponse),
    /// 400 `invalid_request` (reserved request types)
    BadRequest(&'static str),
}

#[derive(Clone)]
pub struct AuthorizationService {
    config: Arc<Config>,
    auth_requests: Arc<dyn AuthRequestStore>,
    authorization_codes: Arc<dyn AuthorizationCodeStore>,
    applications: Arc<dyn ApplicationRegistry>,
    flow_engine: Arc<dyn FlowEngine>,
    assertion_verifier: Arc<dyn AssertionVerifier>,
}

impl AuthorizationService {
    pub fn new(
        config: Arc<Config>,
        auth_requests: Arc<dyn AuthRequestStore>,
        authorization_codes: Arc<dyn AuthorizationCodeStore>,
        applications: Arc<dyn ApplicationRegistry>,
        flow_engine: Arc<dyn FlowEngine>,
        assertion_verifier: Arc<dyn AssertionVerifier>,
    ) -> Self {
        Self {
            config,
            auth_requests,
            authorization_codes,
            applications,
            flow_engine,
            assertion_verifier,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.config.clone(),
            state.auth_requests.clone(),
            state.authorization_codes.clone(),
            state.applications.clone(),
            state.flow_engine.clone(),
            state.assertion_verifier.clone(),
        )
    }

    /// Dispatch a marshalled authorization message.
    pub async fn process(&self, msg: &OAuthMessage) -> AuthorizeOutcome {
        match msg.request_type {
            OAuthRequestType::InitialAuthorizationRequest => {
                AuthorizeOutcome::Redirect(self.handle_initial_request(msg).await)
            }
            OAuthRequestType::AuthorizationResponseFromEngine => {
                AuthorizeOutcome::Finish(self.handle_engine_response(msg).await)
            }
            // Consent responses are wired through the message type but
            // their semantics are not defined yet.
            OAuthRequestType::ConsentResponseFromUser => {
                AuthorizeOutcome::BadRequest("Unsupported request type")
            }
        }
    }

    // ========================================================================
    // Initial leg (GET)
    // ========================================================================

    async fn handle_initial_request(&self, msg: &OAuthMessage) -> String {
        // Rule 1 of the validator, applied before the registry lookup so
        // a missing client_id reads as a request problem, not an unknown
        // client.
        if msg.client_id().is_empty() {
            return self.error_page_redirect("invalid_request", "Missing client_id parameter");
        }

        let app = match self.applications.get_application_by_client_id(msg.client_id()).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                return self.error_page_redirect("invalid_client", "Invalid client_id");
            }
            Err(e) => {
                tracing::error!("application lookup failed for {}: {}", msg.client_id(), e);
                return self.error_page_redirect("invalid_client", "Invalid client_id");
            }
        };

        if let Err(failure) = validate_initial_authorization_request(msg, &app) {
            let redirect_uri = self.effective_redirect_uri(msg, &app);
            if failure.send_error_to_client && !redirect_uri.is_empty() {
                return compose_error_redirect(
                    &redirect_uri,
                    failure.error_code,
                    &failure.error_description,
                    Some(msg.state()),
                );
            }
            return self.error_page_redirect(failure.error_code, &failure.error_description);
        }

        let (standard_scopes, permission_scopes) = split_scopes(msg.scope());
        let requested_permissions = permission_scopes.join(" ");

        let params = OAuthParameters {
            state: msg.state().to_string(),
            client_id: msg.client_id().to_string(),
            redirect_uri: self.effective_redirect_uri(msg, &app),
            response_type: msg.response_type().to_string(),
            standard_scopes,
            permission_scopes,
            code_challenge: msg.code_challenge().to_string(),
            code_challenge_method: msg.code_challenge_method().to_string(),
            resource: msg.resource().to_string(),
        };

        let flow = match self
            .flow_engine
            .initiate_flow(&FlowInitRequest::authentication(&app.app_id, &requested_permissions))
            .await
        {
            Ok(flow) => flow,
            Err(e) => {
                tracing::error!("flow initiation failed for app {}: {}", app.app_id, e);
                return self
                    .error_page_redirect("server_error", "Failed to initiate authentication flow");
            }
        };

        let auth_id = match self.auth_requests.add_request(&params).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("failed to persist authorization request context: {}", e);
                return self
                    .error_page_redirect("server_error", "Failed to persist authorization request");
            }
        };

        let show_insecure_warning = uri_scheme(&params.redirect_uri) == "http";
        self.login_page_redirect(&auth_id, &app.app_id, &flow.flow_id, show_insecure_warning)
    }

    /// The redirect URI the flow operates on: the request's when present,
    /// otherwise the app's sole registered URI.
    fn effective_redirect_uri(&self, msg: &OAuthMessage, app: &OAuthApplication) -> String {
        if !msg.redirect_uri().is_empty() {
            msg.redirect_uri().to_string()
        } else {
            app.default_redirect_uri().unwrap_or_default().to_string()
        }
    }

    // ========================================================================
    // Engine-response leg (POST)
    // ========================================================================

    async fn handle_engine_response(&self, msg: &OAuthMessage) -> AuthorizeFinishResponse {
        let Some(context) = self.load_auth_request_context(&msg.auth_id).await else {
            return self.error_page_finish(
                "invalid_request",
                "Invalid or expired authorization request",
            );
        };

        // With the context in hand the state can be echoed back to the
        // client on failure.
        let assertion = msg.assertion();
        if assertion.is_empty() {
            return AuthorizeFinishResponse {
                redirect_uri: compose_error_redirect(
                    &context.redirect_uri,
                    "invalid_request",
                    "Missing assertion",
                    Some(&context.state),
                ),
            };
        }

        let claims_map = match self.assertion_verifier.verify(assertion).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("assertion verification failed: {}", e);
                return self.error_page_finish("invalid_request", "Invalid assertion");
            }
        };

        let claims = match AssertionClaims::from_claims(&claims_map) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("assertion claim decode failed: {}", e);
                return self.error_page_finish("invalid_request", "Invalid assertion");
            }
        };

        if claims.user_id.is_empty() {
            return self.error_page_finish("invalid_request", "Invalid user identification");
        }

        let (code, state) = match self.build_authorization_code(context, &claims) {
            Ok(built) => built,
            Err(reason) => {
                tracing::error!("authorization code construction failed: {}", reason);
                return self.error_page_finish("server_error", "Failed to generate authorization code");
            }
        };

        if let Err(e) = self.authorization_codes.insert(&code).await {
            tracing::error!("failed to persist authorization code: {}", e);
            return self.error_page_finish("server_error", "Failed to persist authorization code");
        }

        AuthorizeFinishResponse {
            redirect_uri: compose_code_redirect(&code.redirect_uri, &code.code, Some(&state)),
        }
    }

    /// Load the parked request context and clear it unconditionally: the
    /// handle is single-use whatever happens next. Clear failures are
    /// best-effort and only logged.
    async fn load_auth_request_context(&self, auth_id: &str) -> Option<OAuthParameters> {
        let context = match self.auth_requests.get_request(auth_id).await {
            Ok(context) => context,
            Err(e) => {
                tracing::error!("failed to load authorization request context: {}", e);
                None
            }
        };

        if let Err(e) = self.auth_requests.clear_request(auth_id).await {
            tracing::warn!("failed to clear authorization request context: {}", e);
        }

        context
    }

    /// Build the code to persist plus the request `state`, which rides
    /// along only on the wire, never in the stored code.
    fn build_authorization_code(
        &self,
        context: OAuthParameters,
        claims: &AssertionClaims,
    ) -> Result<(AuthorizationCode, String), String> {
        if context.client_id.is_empty() {
            return Err("missing client_id in request context".to_string());
        }
        if context.redirect_uri.is_empty() {
            return Err("missing redirect_uri in request context".to_string());
        }
        if claims.user_id.is_empty() {
            return Err("empty authorized user id".to_string());
        }

        // The engine decides the effective permissions; they replace the
        // requested permission scopes wholesale.
        let permission_scopes = claims.authorized_permissions();

        let time_created = claims.auth_time_or(Utc::now());
        let expiry_time =
            time_created + Duration::seconds(self.config.authorization_code_validity_secs);

        let code = AuthorizationCode {
            code_id: Uuid::new_v4(),
            code: Uuid::new_v4().to_string(),
            client_id: context.client_id,
            redirect_uri: context.redirect_uri,
            authorized_user_id: claims.user_id.clone(),
            authorized_user_type: claims.user_type.clone(),
            user_ou_id: claims.ou_id.clone(),
            user_ou_name: claims.ou_name.clone(),
            user_ou_handle: claims.ou_handle.clone(),
            scopes: join_scopes(&context.standard_scopes, &permission_scopes),
            time_created,
            expiry_time,
            state: CodeState::Active,
            code_challenge: context.code_challenge,
            code_challenge_method: context.code_challenge_method,
            resource: context.resource,
        };

        Ok((code, context.state))
    }

    // ========================================================================
    // Redirect composition
    // ========================================================================

    fn error_page_redirect(&self, error_code: &str, error_message: &str) -> String {
        let mut url = self.config.error_page_url();
        append_query_param(&mut url, "errorCode", error_code);
        append_query_param(&mut url, "errorMessage", error_message);
        url
    }

    fn error_page_finish(&self, error_code: &str, error_message: &str) -> AuthorizeFinishResponse {
        AuthorizeFinishResponse {
            redirect_uri: self.error_page_redirect(error_code, error_message),
        }
    }

    fn login_page_redirect(
        &self,
        auth_id: &str,
        app_id: &str,
        flow_id: &str,
        show_insecure_warning: bool,
    ) -> String {
        let mut url = self.config.login_page_url();
        append_query_param(&mut url, "authId", auth_id);
        append_query_param(&mut url, "appId", app_id);
        append_query_param(&mut url, "flowId", flow_id);
        if show_insecure_warning {
            append_query_param(&mut url, "showInsecureWarning", "true");
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowEngineError;
    use crate::external::FlowInitResponse;
    use crate::repositories::{MemoryAuthRequestStore, MemoryAuthorizationCodeStore};
    use crate::test_support::{test_app, test_config, StaticFlowEngine, StaticRegistry, StaticVerifier};
    use async_trait::async_trait;

    struct FailingFlowEngine;

    #[async_trait]
    impl FlowEngine for FailingFlowEngine {
        async fn initiate_flow(
            &self,
            _request: &FlowInitRequest,
        ) -> Result<FlowInitResponse, FlowEngineError> {
            Err(FlowEngineError::Service("unavailable".to_string()))
        }
    }

    fn service_with(
        app: OAuthApplication,
        flow_engine: Arc<dyn FlowEngine>,
        verifier: Arc<dyn AssertionVerifier>,
    ) -> (AuthorizationService, Arc<MemoryAuthorizationCodeStore>) {
        let codes = Arc::new(MemoryAuthorizationCodeStore::new());
        let service = AuthorizationService::new(
            Arc::new(test_config()),
            Arc::new(MemoryAuthRequestStore::new(600)),
            codes.clone(),
            Arc::new(StaticRegistry(app)),
            flow_engine,
            verifier,
        );
        (service, codes)
    }

    fn service(app: OAuthApplication) -> (AuthorizationService, Arc<MemoryAuthorizationCodeStore>) {
        service_with(app, Arc::new(StaticFlowEngine), Arc::new(StaticVerifier::for_user("alice")))
    }

    fn initial_msg(pairs: &[(&str, &str)]) -> OAuthMessage {
        OAuthMessage::initial(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn happy_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("client_id", "test-client-id"),
            ("redirect_uri", "https://client.example.com/callback"),
            ("response_type", "code"),
            ("scope", "openid profile read write"),
            ("state", "xyz"),
        ]
    }

    fn query_param(url: &str, key: &str) -> Option<String> {
        let parsed = url::Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string())
    }

    #[tokio::test]
    async fn test_happy_path_both_legs() {
        let (service, codes) = service(test_app());

        // Initial leg: redirect to the login page with the flow coordinates
        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        assert!(location.starts_with("https://gate.example.com:9001/login?"));
        assert_eq!(query_param(&location, "appId").unwrap(), "test-app-id");
        assert_eq!(query_param(&location, "flowId").unwrap(), "flow-1");
        assert!(query_param(&location, "showInsecureWarning").is_none());
        let auth_id = query_param(&location, "authId").unwrap();
        assert!(Uuid::parse_str(&auth_id).is_ok());

        // Engine leg: 200 body carrying the code redirect
        let msg = OAuthMessage::engine_response(auth_id, "assertion-jwt".to_string());
        let finish = service.handle_engine_response(&msg).await;
        assert!(finish
            .redirect_uri
            .starts_with("https://client.example.com/callback?code="));
        assert_eq!(query_param(&finish.redirect_uri, "state").unwrap(), "xyz");

        // The stored code carries the engine-authorized permissions, not
        // the requested ones
        let code_value = query_param(&finish.redirect_uri, "code").unwrap();
        let stored = codes.get("test-client-id", &code_value).await.unwrap();
        assert_eq!(stored.scopes, "openid profile read write");
        assert_eq!(stored.authorized_user_id, "alice");
        assert_eq!(stored.state, CodeState::Active);
        assert_eq!(stored.time_created.timestamp(), 1767225600);
        assert_eq!(stored.expiry_time.timestamp(), 1767225600 + 300);
    }

    #[tokio::test]
    async fn test_invalid_redirect_uri_goes_to_error_page() {
        let (service, _) = service(test_app());
        let mut pairs = happy_pairs();
        pairs[1] = ("redirect_uri", "https://malicious.com/cb");

        let location = service.handle_initial_request(&initial_msg(&pairs)).await;
        assert!(location.starts_with("https://gate.example.com:9001/error?"));
        assert_eq!(query_param(&location, "errorCode").unwrap(), "invalid_request");
        assert_eq!(query_param(&location, "errorMessage").unwrap(), "Invalid redirect URI");
    }

    #[tokio::test]
    async fn test_unsupported_response_type_redirects_to_client() {
        let (service, _) = service(test_app());
        let mut pairs = happy_pairs();
        pairs[2] = ("response_type", "token");

        let location = service.handle_initial_request(&initial_msg(&pairs)).await;
        assert!(location.starts_with("https://client.example.com/callback?"));
        assert_eq!(
            query_param(&location, "error").unwrap(),
            "unsupported_response_type"
        );
        assert_eq!(query_param(&location, "state").unwrap(), "xyz");
    }

    #[tokio::test]
    async fn test_pkce_required_enforced() {
        let mut app = test_app();
        app.pkce_required = true;
        let (service, _) = service(app);

        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        assert!(location.starts_with("https://client.example.com/callback?"));
        assert_eq!(query_param(&location, "error").unwrap(), "invalid_request");
        assert!(query_param(&location, "error_description")
            .unwrap()
            .contains("code_challenge is required"));
    }

    #[tokio::test]
    async fn test_resource_with_fragment_rejected() {
        let (service, _) = service(test_app());
        let mut pairs = happy_pairs();
        pairs.push(("resource", "https://api.example.com/r#frag"));

        let location = service.handle_initial_request(&initial_msg(&pairs)).await;
        assert_eq!(query_param(&location, "error").unwrap(), "invalid_target");
        assert!(query_param(&location, "error_description")
            .unwrap()
            .contains("fragment"));
    }

    #[tokio::test]
    async fn test_unknown_client_goes_to_error_page() {
        let (service, _) = service(test_app());
        let mut pairs = happy_pairs();
        pairs[0] = ("client_id", "nobody");

        let location = service.handle_initial_request(&initial_msg(&pairs)).await;
        assert_eq!(query_param(&location, "errorCode").unwrap(), "invalid_client");
    }

    #[tokio::test]
    async fn test_missing_client_id_goes_to_error_page() {
        let (service, _) = service(test_app());
        let location = service
            .handle_initial_request(&initial_msg(&[("response_type", "code")]))
            .await;
        assert_eq!(query_param(&location, "errorCode").unwrap(), "invalid_request");
        assert_eq!(
            query_param(&location, "errorMessage").unwrap(),
            "Missing client_id parameter"
        );
    }

    #[tokio::test]
    async fn test_flow_engine_failure_is_server_error() {
        let (service, _) = service_with(
            test_app(),
            Arc::new(FailingFlowEngine),
            Arc::new(StaticVerifier::for_user("alice")),
        );

        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        assert_eq!(query_param(&location, "errorCode").unwrap(), "server_error");
        assert_eq!(
            query_param(&location, "errorMessage").unwrap(),
            "Failed to initiate authentication flow"
        );
    }

    #[tokio::test]
    async fn test_http_redirect_uri_sets_insecure_warning() {
        let mut app = test_app();
        app.redirect_uris = vec!["http://client.example.com/callback".to_string()];
        let (service, _) = service(app);

        let mut pairs = happy_pairs();
        pairs[1] = ("redirect_uri", "http://client.example.com/callback");
        let location = service.handle_initial_request(&initial_msg(&pairs)).await;
        assert_eq!(query_param(&location, "showInsecureWarning").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_engine_leg_unknown_auth_id() {
        let (service, _) = service(test_app());
        let msg = OAuthMessage::engine_response("no-such-id".to_string(), "jwt".to_string());
        let finish = service.handle_engine_response(&msg).await;
        assert!(finish.redirect_uri.starts_with("https://gate.example.com:9001/error?"));
        assert_eq!(
            query_param(&finish.redirect_uri, "errorCode").unwrap(),
            "invalid_request"
        );
    }

    #[tokio::test]
    async fn test_engine_leg_context_is_single_use() {
        let (service, _) = service(test_app());
        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        let auth_id = query_param(&location, "authId").unwrap();

        let msg = OAuthMessage::engine_response(auth_id.clone(), "jwt".to_string());
        let first = service.handle_engine_response(&msg).await;
        assert!(first.redirect_uri.contains("code="));

        // The context was consumed; a replay observes not-found
        let replay = service.handle_engine_response(&msg).await;
        assert!(replay.redirect_uri.starts_with("https://gate.example.com:9001/error?"));
    }

    #[tokio::test]
    async fn test_engine_leg_empty_assertion_echoes_state_to_client() {
        let (service, _) = service(test_app());
        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        let auth_id = query_param(&location, "authId").unwrap();

        let msg = OAuthMessage::engine_response(auth_id, String::new());
        let finish = service.handle_engine_response(&msg).await;
        assert!(finish
            .redirect_uri
            .starts_with("https://client.example.com/callback?"));
        assert_eq!(query_param(&finish.redirect_uri, "error").unwrap(), "invalid_request");
        assert_eq!(query_param(&finish.redirect_uri, "state").unwrap(), "xyz");
    }

    #[tokio::test]
    async fn test_engine_leg_bad_assertion_goes_to_error_page() {
        let (service, _) = service(test_app());
        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        let auth_id = query_param(&location, "authId").unwrap();

        let msg = OAuthMessage::engine_response(auth_id, "bad".to_string());
        let finish = service.handle_engine_response(&msg).await;
        assert!(finish.redirect_uri.starts_with("https://gate.example.com:9001/error?"));
        assert_eq!(
            query_param(&finish.redirect_uri, "errorMessage").unwrap(),
            "Invalid assertion"
        );
    }

    #[tokio::test]
    async fn test_engine_leg_empty_user_id_rejected() {
        let (service, _) = service_with(
            test_app(),
            Arc::new(StaticFlowEngine),
            Arc::new(StaticVerifier::for_user("")),
        );
        let location = service.handle_initial_request(&initial_msg(&happy_pairs())).await;
        let auth_id = query_param(&location, "authId").unwrap();

        let msg = OAuthMessage::engine_response(auth_id, "jwt".to_string());
        let finish = service.handle_engine_response(&msg).await;
        assert_eq!(
            query_param(&finish.redirect_uri, "errorMessage").unwrap(),
            "Invalid user identification"
        );
    }

    #[tokio::test]
    async fn test_consent_branch_is_bad_request() {
        let (service, _) = service(test_app());
        let mut msg = OAuthMessage::engine_response("x".to_string(), "y".to_string());
        msg.request_type = OAuthRequestType::ConsentResponseFromUser;

        match service.process(&msg).await {
            AuthorizeOutcome::BadRequest(_) => {}
            _ => panic!("consent branch must answer invalid_request"),
        }
    }
}
