// ABOUTME: Issue model shared between the Redmine client and the chat bridge.
// ABOUTME: Holds the wire shapes of the issues API and the resolved domain Issue.

use serde::Deserialize;
use std::fmt;

/// Numeric issue identifier, normalized to its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueId(u64);

impl IssueId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved tracker issue, ready to be rendered.
///
/// `url`, `high_priority` and `closed` are filled in by the lookup
/// implementation; renderers never build URLs or classify priorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub id: IssueId,
    pub subject: String,
    pub project: String,
    pub status: String,
    pub tracker: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: String,
    pub high_priority: bool,
    pub closed: bool,
    pub url: String,
}

/// `{"id": 1, "name": "..."}` reference used throughout the Redmine API.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Body of `GET /issues/{id}.json`.
#[derive(Debug, Deserialize)]
pub struct IssueEnvelope {
    pub issue: RawIssue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub id: u64,
    pub subject: String,
    pub project: NamedRef,
    pub status: NamedRef,
    pub priority: NamedRef,
    #[serde(default)]
    pub tracker: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub fixed_version: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_id_display() {
        assert_eq!(IssueId::new(42).to_string(), "42");
        assert_eq!(IssueId::new(42).get(), 42);
    }

    #[test]
    fn test_decode_full_issue() {
        let body = r#"{
            "issue": {
                "id": 42,
                "project": {"id": 1, "name": "Core"},
                "tracker": {"id": 1, "name": "Bug"},
                "status": {"id": 2, "name": "In Progress"},
                "priority": {"id": 4, "name": "Urgent"},
                "author": {"id": 5, "name": "Jane Doe"},
                "assigned_to": {"id": 6, "name": "John Roe"},
                "category": {"id": 3, "name": "Backend"},
                "fixed_version": {"id": 9, "name": "1.2"},
                "subject": "Crash on save",
                "description": "Stack trace attached",
                "done_ratio": 0
            }
        }"#;

        let envelope: IssueEnvelope = serde_json::from_str(body).unwrap();
        let issue = envelope.issue;
        assert_eq!(issue.id, 42);
        assert_eq!(issue.subject, "Crash on save");
        assert_eq!(issue.project.name, "Core");
        assert_eq!(issue.tracker.unwrap().name, "Bug");
        assert_eq!(issue.priority.id, 4);
        assert_eq!(issue.fixed_version.unwrap().name, "1.2");
        assert_eq!(issue.assigned_to.unwrap().name, "John Roe");
    }

    #[test]
    fn test_decode_minimal_issue() {
        let body = r#"{
            "issue": {
                "id": 7,
                "project": {"id": 1, "name": "Core"},
                "status": {"id": 1, "name": "Open"},
                "priority": {"id": 2, "name": "Normal"},
                "subject": "Fix login"
            }
        }"#;

        let envelope: IssueEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.issue.tracker.is_none());
        assert!(envelope.issue.category.is_none());
        assert!(envelope.issue.fixed_version.is_none());
        assert!(envelope.issue.assigned_to.is_none());
    }
}
