//! Run identifiers and group id minting.

use std::fmt;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::grouping::ContentGroup;

const NONCE_LEN: usize = 6;
const HASH_ID_LEN: usize = 12;

/// How group ids (and therefore markers and rule names) are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerScheme {
    /// Fresh ids every run; convergence relies on cleanup
    #[default]
    RunScoped,
    /// Ids hashed from content and scope; stable across runs
    ContentHash,
}

impl MarkerScheme {
    /// Parse a configuration value (`run` or `content`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "run" | "run_scoped" => Some(MarkerScheme::RunScoped),
            "content" | "content_hash" => Some(MarkerScheme::ContentHash),
            _ => None,
        }
    }
}

/// Date stamp plus nonce identifying one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId {
    date_stamp: String,
    nonce: String,
}

impl RunId {
    pub fn new(date_stamp: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            date_stamp: date_stamp.into(),
            nonce: nonce.into(),
        }
    }

    /// Today's UTC date with a random lowercase alphanumeric nonce.
    pub fn generate() -> Self {
        let nonce: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect::<String>()
            .to_ascii_lowercase();

        Self::new(Utc::now().format("%Y%m%d").to_string(), nonce)
    }

    /// Group id for the group at `ordinal` in this run.
    ///
    /// Ordinals are zero-padded so no marker is a substring of another.
    pub fn group_id(&self, ordinal: usize) -> String {
        format!("{}{}_{:04}", self.date_stamp, self.nonce, ordinal)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.date_stamp, self.nonce)
    }
}

/// Mint the id for a per-user content group.
pub fn group_id(scheme: MarkerScheme, run: &RunId, ordinal: usize, group: &ContentGroup) -> String {
    match scheme {
        MarkerScheme::RunScoped => run.group_id(ordinal),
        MarkerScheme::ContentHash => {
            let mut parts = vec![group.identity.digest()];
            parts.extend(group.emails());
            short_hash(&parts)
        }
    }
}

/// Mint the id for the domain-wide banner rule.
pub fn domain_group_id(scheme: MarkerScheme, run: &RunId, domain: &str, banner: &str) -> String {
    match scheme {
        MarkerScheme::RunScoped => run.group_id(0),
        MarkerScheme::ContentHash => {
            short_hash(&[domain.to_ascii_lowercase(), banner.to_string()])
        }
    }
}

fn short_hash(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(HASH_ID_LEN);
    id
}
