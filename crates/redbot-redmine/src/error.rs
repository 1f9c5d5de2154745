// ABOUTME: Error types for redbot-redmine.
// ABOUTME: Defines RedmineError covering config, HTTP, status and decode failures.

use crate::models::IssueId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedmineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Issue #{0} not found")]
    NotFound(IssueId),

    #[error("Redmine returned {status} for issue #{id}")]
    Status { id: IssueId, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid Redmine URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, RedmineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RedmineError::NotFound(IssueId::new(99)).to_string(),
            "Issue #99 not found"
        );
        let err = RedmineError::Status {
            id: IssueId::new(7),
            status: 503,
        };
        assert_eq!(err.to_string(), "Redmine returned 503 for issue #7");
    }
}
