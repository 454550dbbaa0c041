//! Assignment snapshot types supplied by the data layer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::synth::grouping::GroupingStrategy;

/// One user's resolved content state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Identifier of the user row
    pub user_id: String,
    /// Sender address the rule is scoped to
    pub email: String,
    /// Human readable name, used for rule naming
    #[serde(default)]
    pub display_name: String,
    /// Signature HTML (must be non-empty)
    pub signature_html: String,
    /// Identifier of the signature row, when known
    #[serde(default)]
    pub signature_id: Option<String>,
    /// Banner HTML, if a banner is assigned
    #[serde(default)]
    pub banner_html: Option<String>,
    /// Identifier of the banner row
    #[serde(default)]
    pub banner_id: Option<String>,
    /// Destination of banner clicks
    #[serde(default)]
    pub banner_click_url: Option<String>,
}

impl Assignment {
    /// Banner HTML, treating blank content as no banner.
    pub fn banner(&self) -> Option<&str> {
        self.banner_html
            .as_deref()
            .filter(|html| !html.trim().is_empty())
    }

    /// Banner click URL, treating blank values as absent.
    pub fn click_url(&self) -> Option<&str> {
        self.banner_click_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Which categories of content a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    Signature,
    Banner,
    Both,
}

impl ScriptType {
    pub fn includes_signature(self) -> bool {
        matches!(self, ScriptType::Signature | ScriptType::Both)
    }

    pub fn includes_banner(self) -> bool {
        matches!(self, ScriptType::Banner | ScriptType::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptType::Signature => "signature",
            ScriptType::Banner => "banner",
            ScriptType::Both => "both",
        }
    }
}

/// Organization-wide banner matched by sender domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainWide {
    pub domain_name: String,
    pub banner_content: String,
}

/// Ids of signature and banner rows that still exist in the data store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCatalog {
    #[serde(default)]
    pub signature_ids: BTreeSet<String>,
    #[serde(default)]
    pub banner_ids: BTreeSet<String>,
}

/// Complete input to one synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    pub script_type: ScriptType,
    /// Explicit grouping strategy; selected automatically when absent
    #[serde(default)]
    pub strategy: Option<GroupingStrategy>,
    /// Request per-recipient click analytics; falls back to configuration
    #[serde(default)]
    pub per_recipient_tracking: Option<bool>,
    /// Overrides per-user grouping entirely
    #[serde(default)]
    pub domain_wide: Option<DomainWide>,
    #[serde(default)]
    pub catalog: Option<ReferenceCatalog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(banner: Option<&str>, click: Option<&str>) -> Assignment {
        Assignment {
            user_id: "u1".to_string(),
            email: "jane@example.com".to_string(),
            display_name: "Jane".to_string(),
            signature_html: "<p>Jane</p>".to_string(),
            signature_id: None,
            banner_html: banner.map(str::to_string),
            banner_id: None,
            banner_click_url: click.map(str::to_string),
        }
    }

    #[test]
    fn test_blank_banner_is_absent() {
        assert_eq!(assignment(Some("   "), None).banner(), None);
        assert_eq!(assignment(None, None).banner(), None);
        assert_eq!(assignment(Some("<b>x</b>"), None).banner(), Some("<b>x</b>"));
    }

    #[test]
    fn test_click_url_trimmed() {
        assert_eq!(assignment(None, Some(" ")).click_url(), None);
        assert_eq!(
            assignment(None, Some(" https://example.com ")).click_url(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_script_type_inclusion() {
        assert!(ScriptType::Both.includes_banner());
        assert!(ScriptType::Both.includes_signature());
        assert!(!ScriptType::Banner.includes_signature());
        assert!(!ScriptType::Signature.includes_banner());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{
            "script_type": "both",
            "assignments": [{
                "user_id": "u1",
                "email": "jane@example.com",
                "signature_html": "<p>Jane</p>"
            }]
        }"#;

        let request: SynthesisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.script_type, ScriptType::Both);
        assert_eq!(request.assignments.len(), 1);
        assert_eq!(request.assignments[0].display_name, "");
        assert!(request.strategy.is_none());
        assert!(request.domain_wide.is_none());
    }
}
