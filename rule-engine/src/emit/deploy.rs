//! Deploy script: one `New-TransportRule` per planned rule, in plan order.

use tracing::info;

use crate::model::{PlanStatus, RuleScope, RuleSpec, SkipReason, SynthesisPlan};

use super::cleanup::filter_expression;
use super::{comment_text, quote};

const RULE_SEPARATOR: &str = "# ----------------------------------------------------------------";

/// Render the deploy script for a plan.
pub fn render_deploy_script(plan: &SynthesisPlan) -> String {
    let mut script = String::new();

    script.push_str("# Sigflow transport rule deployment\n");
    script.push_str(&format!("# Run: {}\n", plan.run_id));
    script.push_str(&format!("# Script type: {}\n", plan.script_type.as_str()));
    if let Some(strategy) = plan.strategy {
        script.push_str(&format!("# Grouping: {}\n", strategy.as_str()));
    }
    script.push_str(&format!("# Groups: {}  Rules: {}\n", plan.group_count, plan.rules.len()));
    script.push_str("$ErrorActionPreference = 'Stop'\n\n");

    for skipped in &plan.skipped {
        let reason = match &skipped.reason {
            SkipReason::DanglingBanner { banner_id } => format!("banner {banner_id} no longer exists"),
            SkipReason::DanglingSignature { signature_id } => {
                format!("signature {signature_id} no longer exists")
            }
        };
        let message = format!(
            "Skipped group {} ({} member(s)): {}",
            skipped.group_id,
            skipped.members.len(),
            reason
        );
        script.push_str(&format!("Write-Warning {}\n", quote(&message)));
    }
    if !plan.skipped.is_empty() {
        script.push('\n');
    }

    if plan.status == PlanStatus::NothingToSynthesize {
        script.push_str("Write-Host 'Nothing to synthesize: no eligible rules for this run.'\n");
        return script;
    }

    let total = plan.rules.len();
    for (index, rule) in plan.rules.iter().enumerate() {
        render_rule(&mut script, rule, index + 1, total);
    }

    render_verification(&mut script, plan);

    info!(
        run_id = %plan.run_id,
        rules = total,
        script_length = script.len(),
        "deploy_script_rendered"
    );

    script
}

fn render_rule(script: &mut String, rule: &RuleSpec, position: usize, total: usize) {
    script.push_str(RULE_SEPARATOR);
    script.push('\n');
    script.push_str(&format!("# Rule {position} of {total}: {}\n", comment_text(&rule.name)));
    script.push_str(&format!(
        "# Role: {}  Location: {}  Priority: {}\n",
        rule.role.as_str(),
        rule.location.as_str(),
        rule.priority
    ));
    match &rule.scope {
        RuleScope::Senders(_) => {
            script.push_str(&format!("# Members ({}):\n", rule.members.len()));
            for member in &rule.members {
                let name = if member.display_name.trim().is_empty() {
                    "(no display name)"
                } else {
                    member.display_name.as_str()
                };
                script.push_str(&format!(
                    "#   {} <{}>\n",
                    comment_text(name),
                    comment_text(&member.email)
                ));
            }
        }
        RuleScope::SenderDomain(domain) => {
            script.push_str(&format!("# Members: every sender in {}\n", comment_text(domain)));
        }
    }
    script.push_str(RULE_SEPARATOR);
    script.push('\n');

    script.push_str(&format!("New-TransportRule -Name {} `\n", quote(&rule.name)));
    script.push_str("    -FromScope 'InOrganization' `\n");
    match &rule.scope {
        RuleScope::Senders(addresses) => {
            let list: Vec<String> = addresses.iter().map(|a| quote(a)).collect();
            script.push_str(&format!("    -From {} `\n", list.join(",")));
        }
        RuleScope::SenderDomain(domain) => {
            script.push_str(&format!("    -SenderDomainIs {} `\n", quote(domain)));
        }
    }
    script.push_str(&format!(
        "    -ApplyHtmlDisclaimerLocation {} `\n",
        quote(rule.location.as_str())
    ));
    script.push_str(&format!("    -ApplyHtmlDisclaimerText {} `\n", quote(&rule.content)));
    script.push_str("    -ApplyHtmlDisclaimerFallbackAction 'Wrap' `\n");
    script.push_str(&format!(
        "    -ExceptIfSubjectOrBodyContainsWords {} `\n",
        quote(&rule.exception_marker)
    ));
    script.push_str(&format!("    -Priority {} `\n", rule.priority));
    let enabled = if rule.enabled { "$true" } else { "$false" };
    script.push_str(&format!("    -Enabled {enabled} `\n"));
    script.push_str(&format!("    -Comments {}\n", quote(&rule.comment)));
    script.push_str(&format!(
        "Write-Host {}\n",
        quote(&format!("Created rule: {}", rule.name))
    ));
    script.push('\n');
}

fn render_verification(script: &mut String, plan: &SynthesisPlan) {
    script.push_str(RULE_SEPARATOR);
    script.push('\n');
    script.push_str("# Verification\n");
    script.push_str(RULE_SEPARATOR);
    script.push('\n');
    script.push_str(&format!(
        "Get-TransportRule | Where-Object {{ {} }} |\n",
        filter_expression(&plan.cleanup)
    ));
    script.push_str("    Format-Table Name, State, Priority, ApplyHtmlDisclaimerLocation -AutoSize\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assignment, ScriptType, SynthesisRequest};
    use crate::synth::{synthesize, RunId, SynthesisOptions};

    fn plan_for(assignments: Vec<Assignment>, script_type: ScriptType) -> SynthesisPlan {
        let request = SynthesisRequest {
            assignments,
            script_type,
            strategy: None,
            per_recipient_tracking: None,
            domain_wide: None,
            catalog: None,
        };
        synthesize(&request, &SynthesisOptions::default(), &RunId::new("20261019", "abc123")).unwrap()
    }

    fn assignment(user: &str, name: &str, banner: Option<&str>) -> Assignment {
        Assignment {
            user_id: user.to_string(),
            email: format!("{user}@example.com"),
            display_name: name.to_string(),
            signature_html: format!("<p>{name}</p>"),
            signature_id: None,
            banner_html: banner.map(str::to_string),
            banner_id: banner.map(|_| "b1".to_string()),
            banner_click_url: None,
        }
    }

    #[test]
    fn test_rule_definition_fields() {
        let plan = plan_for(vec![assignment("u1", "Jane", Some("<b>Sale</b>"))], ScriptType::Both);
        let script = render_deploy_script(&plan);

        assert!(script.contains("New-TransportRule -Name 'BANNER_Jane_20261019abc123_0000' `"));
        assert!(script.contains("New-TransportRule -Name 'SIGNATURE_Jane_20261019abc123_0000' `"));
        assert!(script.contains("    -From 'u1@example.com' `"));
        assert!(script.contains("    -ApplyHtmlDisclaimerLocation 'Prepend' `"));
        assert!(script.contains("    -ApplyHtmlDisclaimerLocation 'Append' `"));
        assert!(script.contains("    -ExceptIfSubjectOrBodyContainsWords 'BANNER_MARKER_20261019abc123_0000' `"));
        assert!(script.contains("    -ExceptIfSubjectOrBodyContainsWords 'SIG_MARKER_20261019abc123_0000' `"));
        assert!(script.contains("    -Priority 0 `"));
        assert!(script.contains("    -Priority 5 `"));
        assert!(script.contains("    -Enabled $true `"));
        assert!(script.contains("#   Jane <u1@example.com>"));
    }

    #[test]
    fn test_rules_rendered_in_plan_order() {
        let plan = plan_for(vec![assignment("u1", "Jane", Some("<b>Sale</b>"))], ScriptType::Both);
        let script = render_deploy_script(&plan);

        let banner_at = script.find("-Name 'BANNER_").unwrap();
        let signature_at = script.find("-Name 'SIGNATURE_").unwrap();
        let verify_at = script.find("# Verification").unwrap();
        assert!(banner_at < signature_at);
        assert!(signature_at < verify_at);
    }

    #[test]
    fn test_content_single_quotes_are_doubled() {
        let mut jane = assignment("u1", "Jane", None);
        jane.signature_html = "<p>Jane's desk</p>".to_string();
        let plan = plan_for(vec![jane], ScriptType::Signature);
        let script = render_deploy_script(&plan);

        assert!(script.contains("<p>Jane''s desk</p>"));
        assert!(!script.contains("<p>Jane's desk</p>"));
    }

    #[test]
    fn test_typographic_apostrophes_are_doubled() {
        let mut jane = assignment("u1", "Jane O\u{2019}Brien", None);
        jane.signature_html = "<p>Let\u{2019}s talk</p>".to_string();
        let mut orphan = assignment("u2", "Orphan", None);
        orphan.banner_id = Some("spring\u{2019}s-sale".to_string());
        let plan = plan_for(vec![jane, orphan], ScriptType::Both);
        let script = render_deploy_script(&plan);

        assert!(script.contains("<p>Let\u{2019}\u{2019}s talk</p>"));
        assert!(script.contains("banner spring\u{2019}\u{2019}s-sale no longer exists'"));
        assert!(script.contains("#   Jane O\u{2019}Brien <u1@example.com>"));

        for line in script.lines().filter(|l| !l.starts_with('#')) {
            let bare = line
                .split("\u{2019}\u{2019}")
                .any(|chunk| chunk.contains('\u{2019}'));
            assert!(!bare, "unescaped apostrophe in: {line}");
        }
    }

    #[test]
    fn test_header_lists_every_member() {
        let plan = plan_for(
            vec![assignment("u1", "Jane", None), {
                let mut john = assignment("u2", "John", None);
                john.signature_html = "<p>Jane</p>".to_string();
                john
            }],
            ScriptType::Signature,
        );
        let script = render_deploy_script(&plan);

        assert!(script.contains("# Members (2):"));
        assert!(script.contains("#   Jane <u1@example.com>"));
        assert!(script.contains("#   John <u2@example.com>"));
        assert!(script.contains("    -From 'u1@example.com','u2@example.com' `"));
    }

    #[test]
    fn test_verification_block_queries_managed_rules() {
        let plan = plan_for(vec![assignment("u1", "Jane", None)], ScriptType::Signature);
        let script = render_deploy_script(&plan);

        assert!(script.contains("Get-TransportRule | Where-Object { $_.ApplyHtmlDisclaimerText -ne $null -or $_.Name -like 'BANNER_*'"));
        assert!(script.contains("Format-Table Name, State, Priority, ApplyHtmlDisclaimerLocation"));
    }

    #[test]
    fn test_nothing_to_synthesize_has_no_rules() {
        let plan = plan_for(vec![assignment("u1", "Jane", None)], ScriptType::Banner);
        let script = render_deploy_script(&plan);

        assert!(script.contains("Nothing to synthesize"));
        assert!(!script.contains("New-TransportRule"));
    }

    #[test]
    fn test_skipped_groups_are_reported() {
        let mut orphan = assignment("u2", "Orphan", None);
        orphan.banner_id = Some("gone".to_string());
        let plan = plan_for(vec![assignment("u1", "Jane", None), orphan], ScriptType::Both);
        let script = render_deploy_script(&plan);

        assert!(script.contains("Write-Warning 'Skipped group 20261019abc123_0001 (1 member(s)): banner gone no longer exists'"));
        assert!(script.contains("SIGNATURE_Jane_20261019abc123_0000"));
    }
}
