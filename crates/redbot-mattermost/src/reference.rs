// ABOUTME: Issue reference extraction from chat message text.
// ABOUTME: Matches "#123" and "<tracker>/issues/123", deduplicated in first-occurrence order.

use crate::error::{BridgeError, Result};
use redbot_redmine::IssueId;
use regex::Regex;
use std::collections::HashSet;

/// Finds issue references in message text.
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    pattern: Regex,
}

impl ReferenceExtractor {
    /// Build an extractor for links under `tracker_base_url`.
    pub fn new(tracker_base_url: &str) -> Result<Self> {
        let base = tracker_base_url.trim().trim_end_matches('/');
        let pattern = Regex::new(&format!(r"(?:#|{}/issues/)(\d+)", regex::escape(base)))
            .map_err(|e| BridgeError::Config(format!("invalid reference pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Distinct issue ids referenced in `text`, in order of first occurrence.
    ///
    /// Ids are compared by integer value, so `#012` and `#12` are one reference.
    /// Digit runs too long for an id are ignored.
    pub fn extract(&self, text: &str) -> Vec<IssueId> {
        let mut seen = HashSet::new();
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
            .map(IssueId::new)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
