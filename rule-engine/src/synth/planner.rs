//! Rule planner: expands content groups into rule specifications.
//!
//! Banner rules always take the lowest priority of the range and signature
//! rules the highest, so a banner lands above the body and a signature below
//! it no matter how many other rules exist.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SynthesisError};
use crate::html::{render_banner, render_signature};
use crate::model::{
    DomainWide, MemberRef, ReferenceCatalog, RuleRole, RuleScope, RuleSpec, ScriptType,
    SkipReason, SkippedGroup,
};
use crate::util::address::is_valid_domain;

use super::grouping::{ContentGroup, GroupingStrategy};
use super::run_id::{domain_group_id, group_id, MarkerScheme, RunId};
use super::tracking::tracking_url;

/// Longest display-name segment kept in a rule name.
const MAX_NAME_SEGMENT: usize = 32;

/// Transport rule names are limited to 64 characters.
const MAX_RULE_NAME: usize = 64;

/// Members listed by address in a rule comment before summarizing.
const MAX_COMMENT_MEMBERS: usize = 10;

/// Valid priority values of the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRange {
    min: u8,
    max: u8,
}

impl Default for PriorityRange {
    fn default() -> Self {
        Self { min: 0, max: 5 }
    }
}

impl PriorityRange {
    /// The range must hold at least two values so banners sort strictly first.
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if min >= max {
            return Err(SynthesisError::InvalidPriorityRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Priority of prepended (banner) rules.
    pub fn prepend(&self) -> u8 {
        self.min
    }

    /// Priority of appended (signature) rules.
    pub fn append(&self) -> u8 {
        self.max
    }

    #[cfg(test)]
    fn contains(&self, priority: u8) -> bool {
        (self.min..=self.max).contains(&priority)
    }
}

/// Inputs that shape rule expansion.
#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions<'a> {
    pub script_type: ScriptType,
    pub strategy: GroupingStrategy,
    pub marker_scheme: MarkerScheme,
    pub priorities: PriorityRange,
    pub tracking_endpoint: Option<&'a str>,
    pub catalog: Option<&'a ReferenceCatalog>,
}

/// Rules planned from a set of groups.
#[derive(Debug, Clone, Default)]
pub struct RulePlan {
    pub rules: Vec<RuleSpec>,
    pub skipped: Vec<SkippedGroup>,
    pub dropped_without_banner: usize,
}

/// Expand groups into rules in group order.
pub fn plan_rules(groups: &[ContentGroup], run: &RunId, options: &PlannerOptions<'_>) -> RulePlan {
    let mut plan = RulePlan::default();

    for (ordinal, group) in groups.iter().enumerate() {
        let id = group_id(options.marker_scheme, run, ordinal, group);

        if let Some(reason) = dangling_reference(group, options) {
            warn!(
                group_id = %id,
                members = group.members.len(),
                reason = ?reason,
                "group_skipped"
            );
            plan.skipped.push(SkippedGroup {
                group_id: id,
                members: group.emails(),
                reason,
            });
            continue;
        }

        if options.script_type == ScriptType::Banner && !group.has_banner() {
            debug!(group_id = %id, "group_without_banner_dropped");
            plan.dropped_without_banner += 1;
            continue;
        }

        if options.script_type.includes_banner() {
            if let Some(banner_html) = group.banner_html() {
                plan.rules.push(banner_rule(group, banner_html, &id, options));
            }
        }

        if options.script_type.includes_signature() {
            plan.rules.push(signature_rule(group, &id, options));
        }
    }

    info!(
        groups = groups.len(),
        rules = plan.rules.len(),
        skipped = plan.skipped.len(),
        dropped_without_banner = plan.dropped_without_banner,
        "rule_planning_complete"
    );

    plan
}

/// Plan the single organization-wide banner rule.
pub fn plan_domain_rule(
    domain_wide: &DomainWide,
    run: &RunId,
    scheme: MarkerScheme,
    priorities: PriorityRange,
) -> Result<RuleSpec> {
    let domain = domain_wide.domain_name.trim().to_ascii_lowercase();
    if !is_valid_domain(&domain) {
        return Err(SynthesisError::InvalidDomain(domain_wide.domain_name.clone()));
    }
    if domain_wide.banner_content.trim().is_empty() {
        return Err(SynthesisError::EmptyDomainBanner);
    }

    let role = RuleRole::DomainBanner;
    let id = domain_group_id(scheme, run, &domain, &domain_wide.banner_content);
    let marker = format!("{}{}", role.marker_prefix(), id);

    info!(domain = %domain, group_id = %id, "domain_rule_planned");

    Ok(RuleSpec {
        name: rule_name(role, &sanitize_name(&domain), &id),
        role,
        group_id: id.clone(),
        scope: RuleScope::SenderDomain(domain.clone()),
        location: role.location(),
        content: render_banner(&domain_wide.banner_content, None, &marker),
        exception_marker: marker,
        priority: priorities.prepend(),
        enabled: true,
        comment: format!("Sigflow domain banner for every sender in {domain}. Group {id}."),
        members: Vec::new(),
    })
}

fn banner_rule(group: &ContentGroup, banner_html: &str, id: &str, options: &PlannerOptions<'_>) -> RuleSpec {
    let role = RuleRole::Banner;
    let marker = format!("{}{}", role.marker_prefix(), id);
    let tracking = tracking_url(options.tracking_endpoint, group, options.strategy);

    debug!(group_id = %id, tracked = tracking.is_some(), "banner_rule_planned");

    RuleSpec {
        name: rule_name(role, &member_segment(group), id),
        role,
        group_id: id.to_string(),
        scope: RuleScope::Senders(group.emails()),
        location: role.location(),
        content: render_banner(banner_html, tracking.as_deref(), &marker),
        exception_marker: marker,
        priority: options.priorities.prepend(),
        enabled: true,
        comment: rule_comment(role, group, id),
        members: member_refs(group),
    }
}

fn signature_rule(group: &ContentGroup, id: &str, options: &PlannerOptions<'_>) -> RuleSpec {
    let role = RuleRole::Signature;
    let marker = format!("{}{}", role.marker_prefix(), id);

    debug!(group_id = %id, "signature_rule_planned");

    RuleSpec {
        name: rule_name(role, &member_segment(group), id),
        role,
        group_id: id.to_string(),
        scope: RuleScope::Senders(group.emails()),
        location: role.location(),
        content: render_signature(group.signature_html(), &marker),
        exception_marker: marker,
        priority: options.priorities.append(),
        enabled: true,
        comment: rule_comment(role, group, id),
        members: member_refs(group),
    }
}

fn dangling_reference(group: &ContentGroup, options: &PlannerOptions<'_>) -> Option<SkipReason> {
    if options.script_type.includes_banner() {
        if let Some(banner_id) = group.banner_id() {
            let missing_content = !group.has_banner();
            let missing_row = options
                .catalog
                .is_some_and(|catalog| !catalog.banner_ids.contains(banner_id));
            if missing_content || missing_row {
                return Some(SkipReason::DanglingBanner {
                    banner_id: banner_id.to_string(),
                });
            }
        }
    }

    if let (Some(catalog), Some(signature_id)) = (options.catalog, group.signature_id()) {
        if !catalog.signature_ids.contains(signature_id) {
            return Some(SkipReason::DanglingSignature {
                signature_id: signature_id.to_string(),
            });
        }
    }

    None
}

/// Replace every non-alphanumeric character with `_`.
pub fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .take(MAX_NAME_SEGMENT)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn member_segment(group: &ContentGroup) -> String {
    let member = group.representative();
    let display = member.display_name.trim();
    if display.is_empty() {
        let local = member.email.split('@').next().unwrap_or_default();
        sanitize_name(local)
    } else {
        sanitize_name(display)
    }
}

/// Role token, name segment and id, with the segment shortened to fit the
/// platform's name limit. Segments are ASCII after [`sanitize_name`].
fn rule_name(role: RuleRole, segment: &str, id: &str) -> String {
    let budget = MAX_RULE_NAME.saturating_sub(role.name_token().len() + 1 + id.len());
    let segment = &segment[..segment.len().min(budget)];
    format!("{}{}_{}", role.name_token(), segment, id)
}

fn rule_comment(role: RuleRole, group: &ContentGroup, id: &str) -> String {
    let total = group.members.len();
    let listed: Vec<&str> = group
        .members
        .iter()
        .take(MAX_COMMENT_MEMBERS)
        .map(|m| m.email.as_str())
        .collect();
    let more = if total > MAX_COMMENT_MEMBERS {
        format!(" and {} more", total - MAX_COMMENT_MEMBERS)
    } else {
        String::new()
    };

    format!(
        "Sigflow {} for {} user(s): {}{}. Group {}.",
        role.as_str(),
        total,
        listed.join(", "),
        more,
        id
    )
}

fn member_refs(group: &ContentGroup) -> Vec<MemberRef> {
    group
        .members
        .iter()
        .map(|m| MemberRef {
            display_name: m.display_name.clone(),
            email: m.email.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::{Assignment, Location};
    use crate::synth::grouping::group_assignments;

    fn assignment(user: &str, signature: &str, banner: Option<(&str, &str)>) -> Assignment {
        Assignment {
            user_id: user.to_string(),
            email: format!("{user}@example.com"),
            display_name: format!("User {user}"),
            signature_html: signature.to_string(),
            signature_id: None,
            banner_html: banner.map(|(html, _)| html.to_string()),
            banner_id: banner.map(|(_, id)| id.to_string()),
            banner_click_url: None,
        }
    }

    fn options(script_type: ScriptType) -> PlannerOptions<'static> {
        PlannerOptions {
            script_type,
            strategy: GroupingStrategy::ContentIdentity,
            marker_scheme: MarkerScheme::RunScoped,
            priorities: PriorityRange::default(),
            tracking_endpoint: None,
            catalog: None,
        }
    }

    fn run() -> RunId {
        RunId::new("20261019", "abc123")
    }

    fn plan(assignments: &[Assignment], options: &PlannerOptions<'_>) -> RulePlan {
        let groups = group_assignments(assignments, options.strategy);
        plan_rules(&groups, &run(), options)
    }

    #[test]
    fn test_both_with_banner_emits_ordered_pair() {
        let assignments = vec![assignment("u1", "S", Some(("B", "b1")))];
        let plan = plan(&assignments, &options(ScriptType::Both));

        assert_eq!(plan.rules.len(), 2);
        let banner = &plan.rules[0];
        let signature = &plan.rules[1];
        assert_eq!(banner.role, RuleRole::Banner);
        assert_eq!(banner.location, Location::Prepend);
        assert_eq!(banner.priority, 0);
        assert_eq!(signature.role, RuleRole::Signature);
        assert_eq!(signature.location, Location::Append);
        assert_eq!(signature.priority, 5);
        assert!(banner.priority < signature.priority);
    }

    #[test]
    fn test_both_without_banner_emits_signature_only() {
        let assignments = vec![assignment("u1", "S", None)];
        let plan = plan(&assignments, &options(ScriptType::Both));

        assert_eq!(plan.rules.len(), 1);
        assert_eq!(plan.rules[0].role, RuleRole::Signature);
        assert_eq!(plan.rules[0].priority, 5);
    }

    #[test]
    fn test_pair_priorities_fixed_across_many_groups() {
        let assignments: Vec<Assignment> = (0..6)
            .map(|i| assignment(&format!("u{i}"), &format!("S{i}"), Some(("B", "b1"))))
            .collect();
        let plan = plan(&assignments, &options(ScriptType::Both));

        assert_eq!(plan.rules.len(), 12);
        for rule in &plan.rules {
            let expected = match rule.role {
                RuleRole::Banner => 0,
                _ => 5,
            };
            assert_eq!(rule.priority, expected);
            assert!(PriorityRange::default().contains(rule.priority));
        }
    }

    #[test]
    fn test_signature_rule_count_tracks_distinct_signatures() {
        let assignments = vec![
            assignment("u1", "S1", None),
            assignment("u2", "S1", None),
            assignment("u3", "S2", None),
            assignment("u4", "S1", None),
        ];
        let plan = plan(&assignments, &options(ScriptType::Signature));

        assert_eq!(plan.rules.len(), 2);
        assert_eq!(
            plan.rules[0].scope,
            RuleScope::Senders(vec![
                "u1@example.com".to_string(),
                "u2@example.com".to_string(),
                "u4@example.com".to_string(),
            ])
        );
    }

    #[test]
    fn test_banner_only_drops_bannerless_groups() {
        let assignments = vec![
            assignment("u1", "S1", Some(("B1", "b1"))),
            assignment("u2", "S2", Some(("B2", "b2"))),
            assignment("u3", "S3", None),
            assignment("u4", "S4", Some(("B1", "b1"))),
            assignment("u5", "S5", Some(("B3", "b3"))),
        ];
        let plan = plan(&assignments, &options(ScriptType::Banner));

        assert_eq!(plan.rules.len(), 4);
        assert_eq!(plan.dropped_without_banner, 1);
        assert!(plan.rules.iter().all(|r| r.role == RuleRole::Banner));
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_exception_marker_is_carried_by_own_content_only() {
        let assignments = vec![
            assignment("u1", "S1", Some(("B", "b1"))),
            assignment("u2", "S2", Some(("B", "b1"))),
        ];
        let plan = plan(&assignments, &options(ScriptType::Both));

        let markers: HashSet<&str> = plan.rules.iter().map(|r| r.exception_marker.as_str()).collect();
        assert_eq!(markers.len(), plan.rules.len());

        for rule in &plan.rules {
            assert!(rule.content.contains(&rule.exception_marker));
            for other in plan.rules.iter().filter(|o| o.name != rule.name) {
                assert!(!rule.content.contains(&other.exception_marker));
            }
        }
    }

    #[test]
    fn test_rule_names_are_traceable() {
        let mut first = assignment("u1", "S", Some(("B", "b1")));
        first.display_name = "Jane O'Neil-Smith".to_string();
        let plan = plan(&[first], &options(ScriptType::Both));

        assert_eq!(plan.rules[0].name, "BANNER_Jane_O_Neil_Smith_20261019abc123_0000");
        assert_eq!(plan.rules[1].name, "SIGNATURE_Jane_O_Neil_Smith_20261019abc123_0000");
        assert_eq!(plan.rules[0].exception_marker, "BANNER_MARKER_20261019abc123_0000");
        assert_eq!(plan.rules[1].exception_marker, "SIG_MARKER_20261019abc123_0000");
    }

    #[test]
    fn test_blank_display_name_falls_back_to_local_part() {
        let mut first = assignment("u1", "S", None);
        first.display_name = "  ".to_string();
        first.email = "j.doe@example.com".to_string();
        let plan = plan(&[first], &options(ScriptType::Signature));
        assert_eq!(plan.rules[0].name, "SIGNATURE_j_doe_20261019abc123_0000");
    }

    #[test]
    fn test_dangling_banner_is_skipped_not_fatal() {
        let mut orphan = assignment("u2", "S2", None);
        orphan.banner_id = Some("deleted".to_string());
        let assignments = vec![assignment("u1", "S1", Some(("B", "b1"))), orphan];
        let plan = plan(&assignments, &options(ScriptType::Both));

        assert_eq!(plan.rules.len(), 2);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].members, vec!["u2@example.com".to_string()]);
        assert_eq!(
            plan.skipped[0].reason,
            SkipReason::DanglingBanner { banner_id: "deleted".to_string() }
        );
    }

    #[test]
    fn test_catalog_detects_deleted_rows() {
        let mut gone_signature = assignment("u2", "S2", None);
        gone_signature.signature_id = Some("sig-gone".to_string());
        let assignments = vec![
            assignment("u1", "S1", Some(("B", "b-gone"))),
            gone_signature,
            assignment("u3", "S3", None),
        ];

        let catalog = ReferenceCatalog {
            signature_ids: ["sig-live".to_string()].into_iter().collect(),
            banner_ids: ["b-live".to_string()].into_iter().collect(),
        };
        let mut opts = options(ScriptType::Both);
        opts.catalog = Some(&catalog);

        let plan = plan(&assignments, &opts);
        assert_eq!(plan.skipped.len(), 2);
        assert_eq!(plan.rules.len(), 1);
        assert_eq!(plan.rules[0].scope, RuleScope::Senders(vec!["u3@example.com".to_string()]));
    }

    #[test]
    fn test_tracked_banner_links_point_at_endpoint() {
        let mut tracked = assignment("u1", "S", Some(("<img src=\"b.png\">", "b1")));
        tracked.banner_click_url = Some("https://shop.example".to_string());

        let mut opts = options(ScriptType::Banner);
        opts.tracking_endpoint = Some("https://t.example/click");
        let plan = plan(&[tracked], &opts);

        let hrefs = crate::html::extract_hrefs(&plan.rules[0].content);
        assert_eq!(hrefs, vec!["https://t.example/click?banner_id=b1".to_string()]);
    }

    #[test]
    fn test_comment_summarizes_large_groups() {
        let assignments: Vec<Assignment> = (0..12)
            .map(|i| assignment(&format!("u{i}"), "S", None))
            .collect();
        let plan = plan(&assignments, &options(ScriptType::Signature));
        assert!(plan.rules[0].comment.contains("for 12 user(s)"));
        assert!(plan.rules[0].comment.contains("and 2 more"));
        assert_eq!(plan.rules[0].members.len(), 12);
    }

    #[test]
    fn test_domain_rule() {
        let domain = DomainWide {
            domain_name: " Example.COM ".to_string(),
            banner_content: "<b>Notice</b>".to_string(),
        };
        let rule = plan_domain_rule(&domain, &run(), MarkerScheme::RunScoped, PriorityRange::default()).unwrap();

        assert_eq!(rule.scope, RuleScope::SenderDomain("example.com".to_string()));
        assert_eq!(rule.location, Location::Prepend);
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.name, "DOMAIN_BANNER_example_com_20261019abc123_0000");
        assert!(rule.content.contains(&rule.exception_marker));
    }

    #[test]
    fn test_rule_names_fit_platform_limit() {
        let domain = DomainWide {
            domain_name: "marketing-communications.northwind-traders.example.com".to_string(),
            banner_content: "<b>Notice</b>".to_string(),
        };
        let rule = plan_domain_rule(&domain, &run(), MarkerScheme::RunScoped, PriorityRange::default()).unwrap();

        assert_eq!(rule.name.len(), MAX_RULE_NAME);
        assert!(rule.name.starts_with("DOMAIN_BANNER_marketing_communications_"));
        assert!(rule.name.ends_with("_20261019abc123_0000"));

        let mut long = assignment("u1", "S", Some(("B", "b1")));
        long.display_name = "Maximilian Alexander Featherstonehaugh-Worthington".to_string();
        let plan = plan(&[long], &options(ScriptType::Both));
        for rule in &plan.rules {
            assert!(rule.name.len() <= MAX_RULE_NAME, "{} too long", rule.name);
            assert!(rule.name.ends_with("_20261019abc123_0000"));
        }
    }

    #[test]
    fn test_domain_rule_rejects_bad_input() {
        let bad_domain = DomainWide {
            domain_name: "not a domain".to_string(),
            banner_content: "<b>x</b>".to_string(),
        };
        assert!(matches!(
            plan_domain_rule(&bad_domain, &run(), MarkerScheme::RunScoped, PriorityRange::default()),
            Err(SynthesisError::InvalidDomain(_))
        ));

        let empty_banner = DomainWide {
            domain_name: "example.com".to_string(),
            banner_content: " ".to_string(),
        };
        assert_eq!(
            plan_domain_rule(&empty_banner, &run(), MarkerScheme::RunScoped, PriorityRange::default()),
            Err(SynthesisError::EmptyDomainBanner)
        );
    }

    #[test]
    fn test_priority_range_requires_two_values() {
        assert!(PriorityRange::new(2, 2).is_err());
        assert!(PriorityRange::new(3, 1).is_err());
        let range = PriorityRange::new(1, 4).unwrap();
        assert_eq!((range.prepend(), range.append()), (1, 4));
    }
}
