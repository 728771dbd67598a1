//! Flow-engine client
//!
//! The flow engine runs the interactive login. This core only initiates
//! an authentication flow and later consumes the signed assertion the
//! engine hands to the gate client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::FlowEngineError;

/// The flow type requested by the authorization endpoint.
pub const FLOW_TYPE_AUTHENTICATION: &str = "AUTHENTICATION";

#[derive(Debug, Clone, Serialize)]
pub struct FlowInitRequest {
    pub application_id: String,
    pub flow_type: String,
    pub runtime_data: HashMap<String, String>,
}

impl FlowInitRequest {
    /// Build an authentication-flow request carrying the non-OIDC scopes
    /// as the requested permissions.
    pub fn authentication(application_id: &str, requested_permissions: &str) -> Self {
        let mut runtime_data = HashMap::new();
        if !requested_permissions.is_empty() {
            runtime_data.insert(
                "requested_permissions".to_string(),
                requested_permissions.to_string(),
            );
        }

        Self {
            application_id: application_id.to_string(),
            flow_type: FLOW_TYPE_AUTHENTICATION.to_string(),
            runtime_data,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowInitResponse {
    pub flow_id: String,
}

#[async_trait]
pub trait FlowEngine: Send + Sync {
    async fn initiate_flow(
        &self,
        request: &FlowInitRequest,
    ) -> Result<FlowInitResponse, FlowEngineError>;
}

/// HTTP client for the flow engine's REST surface.
pub struct RestFlowEngine {
    http: reqwest::Client,
    base_url: String,
}

impl RestFlowEngine {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FlowEngine for RestFlowEngine {
    async fn initiate_flow(
        &self,
        request: &FlowInitRequest,
    ) -> Result<FlowInitResponse, FlowEngineError> {
        let url = format!("{}/flows/initiate", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(FlowEngineError::Service(format!(
                "flow initiation returned {}",
                response.status()
            )));
        }

        let flow: FlowInitResponse = response.json().await?;
        if flow.flow_id.is_empty() {
            return Err(FlowEngineError::Service("empty flow id".to_string()));
        }

        Ok(flow)
    }
}
