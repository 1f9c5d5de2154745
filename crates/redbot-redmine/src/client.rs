// ABOUTME: Redmine REST client implementing the IssueLookup port.
// ABOUTME: Fetches issues, builds issue URLs and classifies priority and status ids.

use crate::config::RedmineConfig;
use crate::error::{RedmineError, Result};
use crate::models::{Issue, IssueEnvelope, IssueId, RawIssue};
use crate::IssueLookup;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "X-Redmine-API-Key";

/// HTTP client for a single Redmine instance.
pub struct RedmineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    closed_statuses: HashSet<u64>,
    high_priorities: HashSet<u64>,
}

impl RedmineClient {
    pub fn new(config: &RedmineConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
            closed_statuses: config.closed_statuses.iter().copied().collect(),
            high_priorities: config.high_priorities.iter().copied().collect(),
        })
    }

    /// Base URL without trailing slashes; link-style references are matched against it.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Canonical browser URL of an issue.
    pub fn issue_url(&self, id: IssueId) -> String {
        format!("{}/issues/{}", self.base_url, id)
    }

    pub fn is_high_priority(&self, priority_id: u64) -> bool {
        self.high_priorities.contains(&priority_id)
    }

    pub fn is_closed(&self, status_id: u64) -> bool {
        self.closed_statuses.contains(&status_id)
    }

    /// Fetch the raw issue record.
    pub async fn fetch_issue(&self, id: IssueId) -> Result<RawIssue> {
        let url = format!("{}/issues/{}.json", self.base_url, id);
        debug!(issue_id = %id, "Fetching Redmine issue");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RedmineError::NotFound(id)),
            status if !status.is_success() => Err(RedmineError::Status {
                id,
                status: status.as_u16(),
            }),
            _ => {
                let envelope: IssueEnvelope = response.json().await?;
                Ok(envelope.issue)
            }
        }
    }

    /// Turn a raw record into a domain issue, resolving URL and classifications.
    pub fn resolve(&self, raw: RawIssue) -> Issue {
        let id = IssueId::new(raw.id);
        Issue {
            id,
            url: self.issue_url(id),
            high_priority: self.is_high_priority(raw.priority.id),
            closed: self.is_closed(raw.status.id),
            subject: raw.subject,
            project: raw.project.name,
            status: raw.status.name,
            tracker: raw.tracker.map(|t| t.name),
            category: raw.category.map(|c| c.name),
            version: raw.fixed_version.map(|v| v.name),
            assigned_to: raw.assigned_to.map(|a| a.name),
            priority: raw.priority.name,
        }
    }
}

#[async_trait]
impl IssueLookup for RedmineClient {
    async fn get_issue(&self, id: IssueId) -> Result<Issue> {
        let raw = self.fetch_issue(id).await?;
        Ok(self.resolve(raw))
    }
}
