// ABOUTME: Issue summary rendering and the outbound post it is sent in.
// ABOUTME: Builds the linked title line and the tab-separated field list.

use redbot_redmine::Issue;

/// Color bar of every summary attachment.
pub const ATTACHMENT_COLOR: &str = "#C0C0C0";

/// A summary post addressed to a channel, optionally threaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    pub channel_id: String,
    pub root_id: Option<String>,
    pub color: String,
    pub text: String,
}

impl OutboundNotification {
    pub fn for_issue(issue: &Issue, channel_id: &str, root_id: Option<String>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            root_id,
            color: ATTACHMENT_COLOR.to_string(),
            text: format_issue(issue),
        }
    }
}

/// Render an issue as `[title](url)` followed by a line of `**Field**: value` pairs.
///
/// Optional fields appear only when set; priority appears only for
/// high-priority issues.
pub fn format_issue(issue: &Issue) -> String {
    let title = match &issue.tracker {
        Some(tracker) => format!("{} #{}: {}", tracker, issue.id, issue.subject),
        None => format!("#{}: {}", issue.id, issue.subject),
    };

    let mut fields = vec![
        field("Project", &issue.project),
        field("Status", &issue.status),
    ];
    if let Some(category) = &issue.category {
        fields.push(field("Category", category));
    }
    if let Some(version) = &issue.version {
        fields.push(field("Version", version));
    }
    if let Some(assignee) = &issue.assigned_to {
        fields.push(field("Assigned to", assignee));
    }
    if issue.high_priority {
        fields.push(field("Priority", &issue.priority));
    }

    format!("[{}]({})\n{}", title, issue.url, fields.join("\t"))
}

fn field(name: &str, value: &str) -> String {
    format!("**{}**: {}", name, value)
}
