//! Rule synthesis: assignments in, plan out.
//!
//! ## Flow
//!
//! ```text
//! SynthesisRequest → validate → group_assignments() → plan_rules() → SynthesisPlan
//! ```
//!
//! Synthesis is pure and synchronous. It performs no I/O; applying the plan
//! (and serializing apply-cycles per tenant) is the caller's job.

pub mod grouping;
pub mod planner;
pub mod run_id;
pub mod tracking;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SynthesisError};
use crate::model::{
    Assignment, CleanupPredicate, PlanStatus, RuleRole, SynthesisPlan, SynthesisRequest,
};
use crate::util::address::is_valid_address;

pub use grouping::{group_assignments, ContentGroup, ContentIdentity, GroupingStrategy};
pub use planner::{plan_domain_rule, plan_rules, PlannerOptions, PriorityRange, RulePlan};
pub use run_id::{MarkerScheme, RunId};
pub use tracking::tracking_url;

/// Deployment-level settings applied to every request.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Used when a request does not say whether it wants per-recipient analytics
    pub per_recipient_tracking: bool,
    pub marker_scheme: MarkerScheme,
    pub priorities: PriorityRange,
    pub tracking_endpoint: Option<String>,
    pub extra_managed_prefixes: Vec<String>,
}

impl SynthesisOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        let (min, max) = config.priority_range;
        Ok(Self {
            per_recipient_tracking: config.per_recipient_tracking,
            marker_scheme: config.marker_scheme,
            priorities: PriorityRange::new(min, max)?,
            tracking_endpoint: config.tracking_endpoint.clone(),
            extra_managed_prefixes: config.extra_managed_prefixes.clone().unwrap_or_default(),
        })
    }

    pub fn cleanup_predicate(&self) -> CleanupPredicate {
        CleanupPredicate::default().with_extra_prefixes(&self.extra_managed_prefixes)
    }
}

/// Synthesize the rule plan for one request.
///
/// Errors only on structurally invalid input. An empty result is reported as
/// [`PlanStatus::NothingToSynthesize`].
pub fn synthesize(
    request: &SynthesisRequest,
    options: &SynthesisOptions,
    run: &RunId,
) -> Result<SynthesisPlan> {
    info!(
        run_id = %run,
        script_type = request.script_type.as_str(),
        assignments = request.assignments.len(),
        domain_wide = request.domain_wide.is_some(),
        "synthesis_start"
    );

    let cleanup = options.cleanup_predicate();

    if let Some(domain_wide) = &request.domain_wide {
        if !request.assignments.is_empty() {
            warn!(
                ignored_assignments = request.assignments.len(),
                "domain_wide_overrides_assignments"
            );
        }

        let rule = plan_domain_rule(domain_wide, run, options.marker_scheme, options.priorities)?;
        let plan = SynthesisPlan {
            run_id: run.to_string(),
            script_type: request.script_type,
            strategy: None,
            group_count: 1,
            rules: vec![rule],
            skipped: Vec::new(),
            dropped_without_banner: 0,
            cleanup,
            status: PlanStatus::Ready,
        };
        log_summary(&plan);
        return Ok(plan);
    }

    for assignment in &request.assignments {
        validate_assignment(assignment)?;
    }

    let has_endpoint = options.tracking_endpoint.is_some();
    let strategy = request.strategy.unwrap_or_else(|| {
        let per_recipient = request
            .per_recipient_tracking
            .unwrap_or(options.per_recipient_tracking);
        if per_recipient && !has_endpoint {
            warn!("per_recipient_tracking_without_endpoint");
        }
        GroupingStrategy::select(per_recipient, has_endpoint, &request.assignments)
    });
    if strategy == GroupingStrategy::PerPrincipal && !has_endpoint {
        warn!(
            assignments = request.assignments.len(),
            "per_principal_without_endpoint"
        );
    }

    let groups = group_assignments(&request.assignments, strategy);
    let planner_options = PlannerOptions {
        script_type: request.script_type,
        strategy,
        marker_scheme: options.marker_scheme,
        priorities: options.priorities,
        tracking_endpoint: options.tracking_endpoint.as_deref(),
        catalog: request.catalog.as_ref(),
    };
    let planned = plan_rules(&groups, run, &planner_options);

    let status = if planned.rules.is_empty() {
        PlanStatus::NothingToSynthesize
    } else {
        PlanStatus::Ready
    };

    let plan = SynthesisPlan {
        run_id: run.to_string(),
        script_type: request.script_type,
        strategy: Some(strategy),
        group_count: groups.len(),
        rules: planned.rules,
        skipped: planned.skipped,
        dropped_without_banner: planned.dropped_without_banner,
        cleanup,
        status,
    };
    log_summary(&plan);
    Ok(plan)
}

fn validate_assignment(assignment: &Assignment) -> Result<()> {
    if assignment.signature_html.trim().is_empty() {
        return Err(SynthesisError::EmptySignature {
            user_id: assignment.user_id.clone(),
        });
    }
    if !is_valid_address(&assignment.email) {
        return Err(SynthesisError::InvalidAddress {
            user_id: assignment.user_id.clone(),
            email: assignment.email.clone(),
        });
    }
    Ok(())
}

fn log_summary(plan: &SynthesisPlan) {
    if plan.status == PlanStatus::NothingToSynthesize {
        warn!(
            run_id = %plan.run_id,
            groups = plan.group_count,
            skipped = plan.skipped.len(),
            "nothing_to_synthesize"
        );
        return;
    }

    info!(
        run_id = %plan.run_id,
        strategy = plan.strategy.map(GroupingStrategy::as_str),
        groups = plan.group_count,
        rules = plan.rules.len(),
        banner_rules = plan.rules_with_role(RuleRole::Banner).count(),
        signature_rules = plan.rules_with_role(RuleRole::Signature).count(),
        skipped = plan.skipped.len(),
        "synthesis_complete"
    );
}
