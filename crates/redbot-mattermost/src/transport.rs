// ABOUTME: Chat transport port used by sessions, the dispatcher and channel maintenance.
// ABOUTME: Declares the ChatTransport trait, its event stream type and the REST models it returns.

use crate::error::Result;
use crate::event::InboundEvent;
use crate::notification::OutboundNotification;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;

/// Inbound events of one socket. An `Err` item means the socket failed;
/// nothing after it is read.
pub type EventStream = BoxStream<'static, Result<InboundEvent>>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Everything the bot needs from the chat server.
///
/// A transport is reusable across sessions: each `open_events` call opens a
/// fresh socket.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a websocket and start listening.
    async fn open_events(&self) -> Result<EventStream>;

    /// The bot's own account.
    async fn get_me(&self) -> Result<User>;

    async fn get_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>>;

    /// All public channels of a team.
    async fn get_public_channels_for_team(&self, team_id: &str) -> Result<Vec<Channel>>;

    /// Channels of a team the user is already a member of.
    async fn get_channels_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<Channel>>;

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<()>;

    async fn create_post(&self, notification: &OutboundNotification) -> Result<()>;
}
