//! Error types for rule synthesis.
//!
//! Only structurally invalid input is an error. "Nothing to synthesize" and
//! skipped groups are reported on the plan instead.

use thiserror::Error;

/// Structural input errors that abort a synthesis run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("assignment for user {user_id} has an empty signature")]
    EmptySignature { user_id: String },

    #[error("assignment for user {user_id} has an unusable address: {email:?}")]
    InvalidAddress { user_id: String, email: String },

    #[error("invalid sender domain: {0:?}")]
    InvalidDomain(String),

    #[error("domain-wide mode requires non-empty banner content")]
    EmptyDomainBanner,

    #[error("invalid priority range {min}..={max}")]
    InvalidPriorityRange { min: u8, max: u8 },
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
