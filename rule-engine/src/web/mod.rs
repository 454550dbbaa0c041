//! Web server module exposing synthesis over HTTP.
//!
//! This module provides a thin web server that:
//! - Verifies request signatures when a signing key is configured
//! - Synthesizes plans and renders their scripts on request
//! - Serves the standalone cleanup script
//!
//! Applying scripts to the mail platform is left to the caller.

pub mod handlers;
pub mod signature;

pub use handlers::{cleanup, health, synthesize_rules, AppState, ErrorResponse, HealthResponse};
pub use signature::{is_signature_verification_enabled, sign_request, verify_request_signature};
