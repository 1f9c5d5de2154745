// ABOUTME: Routes inbound events to handlers; only "posted" events are acted on.
// ABOUTME: Extracts issue references, looks each one up and posts its summary back to the channel.

use crate::event::{EventKind, InboundEvent, Message};
use crate::notification::OutboundNotification;
use crate::reference::ReferenceExtractor;
use crate::transport::ChatTransport;

use futures::FutureExt;
use redbot_redmine::IssueLookup;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Turns chat posts into issue summaries.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    lookup: Arc<dyn IssueLookup>,
    extractor: ReferenceExtractor,
    thread_replies: bool,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        lookup: Arc<dyn IssueLookup>,
        extractor: ReferenceExtractor,
        thread_replies: bool,
    ) -> Self {
        Self {
            transport,
            lookup,
            extractor,
            thread_replies,
        }
    }

    /// Handle one event.
    ///
    /// Never fails: decode, lookup and post errors are logged, and a panic in
    /// a handler is caught and logged so the listen loop keeps going.
    pub async fn dispatch(&self, event: &InboundEvent, bot_user_id: &str) {
        match event.kind {
            EventKind::Posted => {}
            kind => {
                debug!(?kind, seq = event.seq, "Ignoring event");
                return;
            }
        }

        let handled = AssertUnwindSafe(self.handle_posted(event, bot_user_id))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            error!(
                seq = event.seq,
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked, event dropped"
            );
        }
    }

    async fn handle_posted(&self, event: &InboundEvent, bot_user_id: &str) {
        let message = match Message::from_event(event) {
            Ok(message) => message,
            Err(e) => {
                error!(seq = event.seq, error = %e, "Cannot decode posted event");
                return;
            }
        };

        if message.user_id == bot_user_id {
            debug!(post_id = %message.id, "Skipping own post");
            return;
        }

        let references = self.extractor.extract(&message.text);
        if references.is_empty() {
            return;
        }
        debug!(
            post_id = %message.id,
            channel_id = %message.channel_id,
            count = references.len(),
            "Found issue references"
        );

        let root_id = message.reply_root_id(self.thread_replies);
        for id in references {
            let issue = match self.lookup.get_issue(id).await {
                Ok(issue) => issue,
                Err(e) => {
                    warn!(issue_id = %id, error = %e, "Cannot fetch issue");
                    continue;
                }
            };

            let notification =
                OutboundNotification::for_issue(&issue, &message.channel_id, root_id.clone());
            match self.transport.create_post(&notification).await {
                Ok(()) => info!(
                    issue_id = %id,
                    channel_id = %message.channel_id,
                    closed = issue.closed,
                    high_priority = issue.high_priority,
                    "Posted issue summary"
                ),
                Err(e) => error!(
                    issue_id = %id,
                    channel_id = %message.channel_id,
                    error = %e,
                    "Cannot post issue summary"
                ),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
