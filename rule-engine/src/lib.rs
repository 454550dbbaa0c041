//! Sigflow - transport rule synthesis for email signatures and banners.
//!
//! This library turns per-user signature/banner assignments into a minimal,
//! deterministic set of mail-flow rules and renders them as Exchange Online
//! PowerShell. Two binaries wrap it:
//! - `sigflow`: reads a request on stdin, writes artifacts to stdout
//! - `sigflow-web`: serves synthesis over HTTP
//!
//! ## Architecture
//!
//! ```text
//! Assignments → Canonicalizer → Grouping → Planner → Emitter → scripts
//! ```

pub mod config;
pub mod emit;
pub mod error;
pub mod html;
pub mod model;
pub mod synth;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use emit::{render_cleanup_script, render_deploy_script, SynthesisArtifacts};
pub use error::SynthesisError;
pub use model::{Assignment, RuleSpec, ScriptType, SynthesisPlan, SynthesisRequest};
pub use synth::{synthesize, GroupingStrategy, MarkerScheme, RunId, SynthesisOptions};
pub use web::AppState;
