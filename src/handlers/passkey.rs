//! Passkey ceremony handlers
//!
//! Thin wrappers over [`PasskeyService`]; all policy lives in the
//! service. A body that does not deserialize at all reads as invalid
//! finish data.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::config::AppState;
use crate::dto::{
    FinishAuthenticationRequest, FinishAuthenticationResponse, FinishRegistrationRequest,
    FinishRegistrationResponse, StartAuthenticationRequest, StartAuthenticationResponse,
    StartRegistrationRequest, StartRegistrationResponse,
};
use crate::error::PasskeyError;
use crate::services::PasskeyService;

fn require_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PasskeyError> {
    payload.map(|Json(body)| body).map_err(|_| PasskeyError::InvalidFinishData)
}

/// POST /passkey/registration/start
pub async fn start_registration_handler(
    State(state): State<AppState>,
    payload: Result<Json<StartRegistrationRequest>, JsonRejection>,
) -> Result<Json<StartRegistrationResponse>, PasskeyError> {
    let req = require_body(payload)?;
    let service = PasskeyService::from_state(&state);
    Ok(Json(service.start_registration(&req).await?))
}

/// POST /passkey/registration/finish
pub async fn finish_registration_handler(
    State(state): State<AppState>,
    payload: Result<Json<FinishRegistrationRequest>, JsonRejection>,
) -> Result<Json<FinishRegistrationResponse>, PasskeyError> {
    let req = require_body(payload)?;
    let service = PasskeyService::from_state(&state);
    Ok(Json(service.finish_registration(&req).await?))
}

/// POST /passkey/authentication/start
pub async fn start_authentication_handler(
    State(state): State<AppState>,
    payload: Result<Json<StartAuthenticationRequest>, JsonRejection>,
) -> Result<Json<StartAuthenticationResponse>, PasskeyError> {
    let req = require_body(payload)?;
    let service = PasskeyService::from_state(&state);
    Ok(Json(service.start_authentication(&req).await?))
}

/// POST /passkey/authentication/finish
pub async fn finish_authentication_handler(
    State(state): State<AppState>,
    payload: Result<Json<FinishAuthenticationRequest>, JsonRejection>,
) -> Result<Json<FinishAuthenticationResponse>, PasskeyError> {
    let req = require_body(payload)?;
    let service = PasskeyService::from_state(&state);
    Ok(Json(service.finish_authentication(&req).await?))
}
