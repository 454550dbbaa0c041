//! HTTP endpoint handlers.
//!
//! Handlers only authenticate, decode and hand off to the synthesis core.
//! Nothing is applied to the mail platform from here.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::emit::{render_cleanup_script, SynthesisArtifacts};
use crate::model::SynthesisRequest;
use crate::synth::{synthesize, RunId, SynthesisOptions};
use crate::web::signature::{
    is_signature_verification_enabled, verify_request_signature, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Synthesis
// =============================================================================

/// Error body for rejected requests.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn reject(code: StatusCode, status: &'static str, error: Option<String>) -> Response {
    (code, Json(ErrorResponse { status, error })).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Verify the request signature when a signing key is configured.
fn authorize(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), Response> {
    if !is_signature_verification_enabled(&state.config.signing_key) {
        return Ok(());
    }
    let signing_key = state.config.signing_key.as_deref().unwrap_or_default();

    if verify_request_signature(
        signing_key,
        header_str(headers, TIMESTAMP_HEADER),
        body,
        header_str(headers, SIGNATURE_HEADER),
        state.config.signature_max_age,
    ) {
        Ok(())
    } else {
        warn!("request_unauthorized");
        Err(reject(StatusCode::UNAUTHORIZED, "unauthorized", None))
    }
}

/// Synthesis endpoint.
///
/// Accepts a JSON [`SynthesisRequest`] and returns the plan with its deploy,
/// cleanup and redeploy scripts. Invalid input yields 422; an empty plan is
/// still a 200 with status `nothing_to_synthesize`.
pub async fn synthesize_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(body_length = body.len(), "synthesis_request_received");

    if let Err(response) = authorize(&state, &headers, &body) {
        return response;
    }

    let request: SynthesisRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "synthesis_request_invalid_json");
            return reject(StatusCode::BAD_REQUEST, "invalid_json", Some(e.to_string()));
        }
    };

    let options = match SynthesisOptions::from_config(&state.config) {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "synthesis_config_invalid");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "config_invalid", Some(e.to_string()));
        }
    };

    let run = RunId::generate();
    match synthesize(&request, &options, &run) {
        Ok(plan) => {
            let artifacts = SynthesisArtifacts::render(plan, state.config.propagation_wait_secs);
            info!(
                run_id = %artifacts.plan.run_id,
                rules = artifacts.plan.rules.len(),
                "synthesis_request_complete"
            );
            (StatusCode::OK, Json(artifacts)).into_response()
        }
        Err(e) => {
            warn!(run_id = %run, error = %e, "synthesis_request_rejected");
            reject(StatusCode::UNPROCESSABLE_ENTITY, "invalid_input", Some(e.to_string()))
        }
    }
}

/// Standalone cleanup endpoint ("Step 1: Cleanup").
///
/// Returns the cleanup script as plain text.
pub async fn cleanup(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers, &[]) {
        return response;
    }

    let options = match SynthesisOptions::from_config(&state.config) {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "synthesis_config_invalid");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "config_invalid", Some(e.to_string()));
        }
    };

    let script = render_cleanup_script(
        &options.cleanup_predicate(),
        state.config.propagation_wait_secs,
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        script,
    )
        .into_response()
}
