// ABOUTME: Inbound websocket event model and message decoding.
// ABOUTME: Turns Mattermost text frames into InboundEvent and "posted" payloads into Message.

use crate::error::{BridgeError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Kind of a server push. Kinds the bot never looks at collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Hello,
    Posted,
    PostEdited,
    PostDeleted,
    Typing,
    ChannelViewed,
    StatusChange,
    UserAdded,
    UserRemoved,
    #[serde(other)]
    Other,
}

/// One decoded server push.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub seq: u64,
}

impl InboundEvent {
    /// Decode a websocket text frame.
    ///
    /// Returns `Ok(None)` for replies to our own actions (`seq_reply` frames),
    /// which carry no event.
    pub fn from_frame(text: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("event").is_some() {
            return Ok(Some(serde_json::from_value(value)?));
        }
        if value.get("seq_reply").is_some() {
            return Ok(None);
        }
        Err(BridgeError::Decode(format!(
            "frame is neither an event nor a reply: {}",
            truncate(text, 200)
        )))
    }
}

/// A chat post carried by a "posted" event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    /// Thread root; empty for top-level posts.
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, rename = "message")]
    pub text: String,
}

impl Message {
    /// Decode the post embedded in a "posted" event.
    /// Mattermost sends it as a JSON document inside a string field.
    pub fn from_event(event: &InboundEvent) -> Result<Self> {
        let post = event
            .data
            .get("post")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::Decode("posted event has no post field".into()))?;
        Ok(serde_json::from_str(post)?)
    }

    /// Root id to use when replying.
    /// If already in a thread, reply there. Otherwise start a thread only when asked to.
    pub fn reply_root_id(&self, thread_replies: bool) -> Option<String> {
        if !self.root_id.is_empty() {
            Some(self.root_id.clone())
        } else if thread_replies {
            Some(self.id.clone())
        } else {
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
