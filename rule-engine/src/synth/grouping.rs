//! Grouping engine: partitions assignments into content groups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::model::Assignment;

/// How assignments are keyed into groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Users with identical signature and banner share one rule
    #[default]
    ContentIdentity,
    /// Every user gets its own group so tracking URLs can name them
    PerPrincipal,
}

impl GroupingStrategy {
    /// Per-principal grouping only pays off when analytics are requested, a
    /// tracking endpoint can encode the recipient, and some banner actually
    /// has a click URL.
    pub fn select(
        per_recipient_tracking: bool,
        has_tracking_endpoint: bool,
        assignments: &[Assignment],
    ) -> Self {
        let has_click_url = assignments
            .iter()
            .any(|a| a.banner().is_some() && a.click_url().is_some());

        if per_recipient_tracking && has_tracking_endpoint && has_click_url {
            GroupingStrategy::PerPrincipal
        } else {
            GroupingStrategy::ContentIdentity
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupingStrategy::ContentIdentity => "content_identity",
            GroupingStrategy::PerPrincipal => "per_principal",
        }
    }
}

/// Grouping key. Equal identities are interchangeable for rule purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentity {
    /// Only set under per-principal grouping
    pub email: Option<String>,
    pub signature_html: String,
    pub banner_html: Option<String>,
    pub banner_id: Option<String>,
}

impl ContentIdentity {
    pub fn of(assignment: &Assignment, strategy: GroupingStrategy) -> Self {
        let email = match strategy {
            GroupingStrategy::ContentIdentity => None,
            GroupingStrategy::PerPrincipal => Some(assignment.email.clone()),
        };

        Self {
            email,
            signature_html: assignment.signature_html.clone(),
            banner_html: assignment.banner().map(str::to_string),
            banner_id: assignment.banner_id.clone(),
        }
    }

    /// SHA-256 hex digest of the identity.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.email.as_deref(),
            Some(self.signature_html.as_str()),
            self.banner_html.as_deref(),
            self.banner_id.as_deref(),
        ] {
            match field {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// The unit of rule generation.
#[derive(Debug, Clone)]
pub struct ContentGroup {
    pub identity: ContentIdentity,
    /// Never empty; insertion order preserved
    pub members: Vec<Assignment>,
}

impl ContentGroup {
    fn new(identity: ContentIdentity, first: Assignment) -> Self {
        Self {
            identity,
            members: vec![first],
        }
    }

    /// First member, used for naming.
    pub fn representative(&self) -> &Assignment {
        &self.members[0]
    }

    pub fn signature_html(&self) -> &str {
        &self.identity.signature_html
    }

    pub fn banner_html(&self) -> Option<&str> {
        self.identity.banner_html.as_deref()
    }

    pub fn banner_id(&self) -> Option<&str> {
        self.identity.banner_id.as_deref()
    }

    /// First click URL carried by any member.
    pub fn banner_click_url(&self) -> Option<&str> {
        self.members.iter().find_map(|m| m.click_url())
    }

    /// First signature id carried by any member.
    pub fn signature_id(&self) -> Option<&str> {
        self.members.iter().find_map(|m| m.signature_id.as_deref())
    }

    pub fn has_banner(&self) -> bool {
        self.identity.banner_html.is_some()
    }

    pub fn emails(&self) -> Vec<String> {
        self.members.iter().map(|m| m.email.clone()).collect()
    }
}

/// Partition assignments into groups, preserving first-seen order.
pub fn group_assignments(assignments: &[Assignment], strategy: GroupingStrategy) -> Vec<ContentGroup> {
    let mut index: HashMap<ContentIdentity, usize> = HashMap::new();
    let mut groups: Vec<ContentGroup> = Vec::new();

    for assignment in assignments {
        let identity = ContentIdentity::of(assignment, strategy);

        match index.get(&identity) {
            Some(&position) => groups[position].members.push(assignment.clone()),
            None => {
                let digest = identity.digest();
                debug!(
                    group_index = groups.len(),
                    identity = &digest[..12],
                    user_id = %assignment.user_id,
                    "group_created"
                );
                index.insert(identity.clone(), groups.len());
                groups.push(ContentGroup::new(identity, assignment.clone()));
            }
        }
    }

    info!(
        strategy = strategy.as_str(),
        assignments = assignments.len(),
        groups = groups.len(),
        "grouping_complete"
    );

    groups
}
