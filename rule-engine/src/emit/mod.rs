//! Script emission for Exchange Online transport rules.
//!
//! Produces three artifacts from a plan:
//! - deploy: creates every planned rule, then verifies
//! - cleanup: discovers, removes, waits, verifies and retries once
//! - redeploy: cleanup followed by deploy

pub mod cleanup;
pub mod deploy;

use serde::{Deserialize, Serialize};

use crate::html::escape;
use crate::model::SynthesisPlan;

pub use cleanup::{filter_expression, render_cleanup_script};
pub use deploy::render_deploy_script;

/// Default wait for rule changes to propagate between cleanup passes.
pub const DEFAULT_PROPAGATION_WAIT_SECS: u64 = 30;

/// Everything a caller needs to apply a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisArtifacts {
    pub plan: SynthesisPlan,
    pub deploy_script: String,
    pub cleanup_script: String,
    pub redeploy_script: String,
}

impl SynthesisArtifacts {
    pub fn render(plan: SynthesisPlan, propagation_wait_secs: u64) -> Self {
        let deploy_script = render_deploy_script(&plan);
        let cleanup_script = render_cleanup_script(&plan.cleanup, propagation_wait_secs);
        let redeploy_script = render_redeploy_script(&plan, propagation_wait_secs);

        Self {
            plan,
            deploy_script,
            cleanup_script,
            redeploy_script,
        }
    }
}

/// Full reset: cleanup (step 1) then deploy (step 2).
pub fn render_redeploy_script(plan: &SynthesisPlan, propagation_wait_secs: u64) -> String {
    let mut script = String::new();
    script.push_str("# ================================================================\n");
    script.push_str("# Step 1: Cleanup\n");
    script.push_str("# ================================================================\n");
    script.push_str(&render_cleanup_script(&plan.cleanup, propagation_wait_secs));
    script.push('\n');
    script.push_str("# ================================================================\n");
    script.push_str("# Step 2: Deploy\n");
    script.push_str("# ================================================================\n");
    script.push_str(&render_deploy_script(plan));
    script
}

/// Single-quoted PowerShell literal.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", escape(value))
}

/// Text safe to place after `#` on one line.
pub(crate) fn comment_text(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
