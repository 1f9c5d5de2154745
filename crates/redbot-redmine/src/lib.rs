// ABOUTME: Library root for redbot-redmine.
// ABOUTME: Exports the issue model, the IssueLookup port and the Redmine client.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::RedmineClient;
pub use config::RedmineConfig;
pub use error::{RedmineError, Result};
pub use models::{Issue, IssueId};

use async_trait::async_trait;

/// Resolves issue references into displayable issues.
///
/// Implementations may be slow or fail per call; callers treat every
/// lookup independently and never retry.
#[async_trait]
pub trait IssueLookup: Send + Sync {
    async fn get_issue(&self, id: IssueId) -> Result<Issue>;
}
