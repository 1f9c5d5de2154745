// ABOUTME: Periodic channel maintenance: joins the bot to every public channel of its teams.
// ABOUTME: Only channels the bot is not yet in are joined; one failure never stops the sweep.

use crate::transport::{ChatTransport, User};

use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinReport {
    pub teams: usize,
    pub joined: usize,
    pub failed: usize,
}

/// Add `user` to every public channel of every team it belongs to.
pub async fn join_channels(transport: &dyn ChatTransport, user: &User) -> JoinReport {
    let mut report = JoinReport::default();

    let teams = match transport.get_teams_for_user(&user.id).await {
        Ok(teams) => teams,
        Err(e) => {
            error!(error = %e, "Cannot list teams");
            report.failed += 1;
            return report;
        }
    };
    report.teams = teams.len();

    for team in &teams {
        let channels = match transport.get_public_channels_for_team(&team.id).await {
            Ok(channels) => channels,
            Err(e) => {
                error!(team = %team.name, team_id = %team.id, error = %e, "Cannot list channels");
                report.failed += 1;
                continue;
            }
        };
        if channels.is_empty() {
            continue;
        }

        let member_of: HashSet<String> =
            match transport.get_channels_for_user(&user.id, &team.id).await {
                Ok(joined) => joined.into_iter().map(|c| c.id).collect(),
                Err(e) => {
                    warn!(team = %team.name, error = %e, "Cannot list memberships, joining all channels");
                    HashSet::new()
                }
            };

        for channel in channels.iter().filter(|c| !member_of.contains(&c.id)) {
            match transport.add_channel_member(&channel.id, &user.id).await {
                Ok(()) => {
                    debug!(team = %team.name, channel = %channel.name, "Joined channel");
                    report.joined += 1;
                }
                Err(e) => {
                    warn!(
                        team = %team.name,
                        channel = %channel.name,
                        channel_id = %channel.id,
                        error = %e,
                        "Cannot join channel"
                    );
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        teams = report.teams,
        joined = report.joined,
        failed = report.failed,
        "Channel join finished"
    );
    report
}
