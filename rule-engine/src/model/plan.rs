//! Synthesis output types: rule specifications and the cleanup predicate.

use serde::{Deserialize, Serialize};

use crate::model::ScriptType;
use crate::synth::grouping::GroupingStrategy;

/// Where injected content lands relative to the original body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Prepend,
    Append,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Location::Prepend => "Prepend",
            Location::Append => "Append",
        }
    }
}

/// Category of content a rule injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRole {
    Banner,
    Signature,
    DomainBanner,
}

impl RuleRole {
    /// Every role, in the order their name prefixes are listed for cleanup.
    pub const ALL: [RuleRole; 3] = [RuleRole::Banner, RuleRole::Signature, RuleRole::DomainBanner];

    /// Leading token of every rule name with this role.
    pub fn name_token(self) -> &'static str {
        match self {
            RuleRole::Banner => "BANNER_",
            RuleRole::Signature => "SIGNATURE_",
            RuleRole::DomainBanner => "DOMAIN_BANNER_",
        }
    }

    pub fn marker_prefix(self) -> &'static str {
        match self {
            RuleRole::Banner => "BANNER_MARKER_",
            RuleRole::Signature => "SIG_MARKER_",
            RuleRole::DomainBanner => "DOMAIN_MARKER_",
        }
    }

    pub fn location(self) -> Location {
        match self {
            RuleRole::Banner | RuleRole::DomainBanner => Location::Prepend,
            RuleRole::Signature => Location::Append,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleRole::Banner => "banner",
            RuleRole::Signature => "signature",
            RuleRole::DomainBanner => "domain_banner",
        }
    }
}

/// Sender scope of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Explicit from-address set
    Senders(Vec<String>),
    /// Every sender in a domain
    SenderDomain(String),
}

/// Group member named in a rule's header comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub display_name: String,
    pub email: String,
}

/// One emittable transport rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub role: RuleRole,
    pub group_id: String,
    pub scope: RuleScope,
    pub location: Location,
    /// Rendered HTML, not yet escaped for the target syntax
    pub content: String,
    /// Token carried by `content` and excluded by the rule itself
    pub exception_marker: String,
    pub priority: u8,
    pub enabled: bool,
    pub comment: String,
    pub members: Vec<MemberRef>,
}

/// Why a group produced no rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The banner id resolves to no banner content
    DanglingBanner { banner_id: String },
    /// The signature id is not present in the catalog
    DanglingSignature { signature_id: String },
}

/// Diagnostic for a group excluded from the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub group_id: String,
    pub members: Vec<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Ready,
    NothingToSynthesize,
}

/// Discovery predicate for every rule a previous run may have left behind.
///
/// A rule matches when it carries injected content, or when its name starts
/// with one of the managed prefixes (case-insensitive, like `-like`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPredicate {
    pub match_injection_attribute: bool,
    pub managed_prefixes: Vec<String>,
}

impl Default for CleanupPredicate {
    fn default() -> Self {
        Self {
            match_injection_attribute: true,
            managed_prefixes: RuleRole::ALL
                .iter()
                .map(|role| role.name_token().to_string())
                .collect(),
        }
    }
}

impl CleanupPredicate {
    /// Add extra prefixes, skipping blanks and duplicates.
    pub fn with_extra_prefixes<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prefix in extra {
            let prefix = prefix.as_ref().trim();
            if prefix.is_empty() {
                continue;
            }
            let exists = self
                .managed_prefixes
                .iter()
                .any(|p| p.eq_ignore_ascii_case(prefix));
            if !exists {
                self.managed_prefixes.push(prefix.to_string());
            }
        }
        self
    }

    /// Evaluate the predicate against an existing rule.
    pub fn matches(&self, rule_name: &str, has_injected_content: bool) -> bool {
        if self.match_injection_attribute && has_injected_content {
            return true;
        }
        let name = rule_name.to_ascii_lowercase();
        self.managed_prefixes
            .iter()
            .any(|prefix| name.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Final artifact of one synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisPlan {
    pub run_id: String,
    pub script_type: ScriptType,
    /// `None` in domain-wide mode
    pub strategy: Option<GroupingStrategy>,
    pub group_count: usize,
    pub rules: Vec<RuleSpec>,
    pub skipped: Vec<SkippedGroup>,
    /// Groups left out because the run emits banners only and they have none
    pub dropped_without_banner: usize,
    pub cleanup: CleanupPredicate,
    pub status: PlanStatus,
}

impl SynthesisPlan {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules_with_role(&self, role: RuleRole) -> impl Iterator<Item = &RuleSpec> {
        self.rules.iter().filter(move |rule| rule.role == role)
    }
}
