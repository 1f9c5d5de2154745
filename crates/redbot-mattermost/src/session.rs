// ABOUTME: One websocket connection to the chat server and its listen loop.
// ABOUTME: Tracks Connecting/Listening/Closing/Failed state and reports how the session ended.

use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::transport::{ChatTransport, EventStream, User};

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a session.
///
/// `Disconnected -> Connecting -> Listening -> (Closing | Failed)`, and a
/// closed session ends in `Disconnected`. A failed session stays `Failed`;
/// it is replaced, never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Listening,
    Closing,
    Failed,
}

/// How the listen loop stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// `close()` was called.
    Closed,
    /// The socket errored or ended on its own.
    Failed(BridgeError),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionEnd::Failed(_))
    }
}

/// A live connection: one socket, one listen task.
///
/// Dropping the session closes it.
pub struct Session {
    id: u64,
    user: User,
    closer: CancellationToken,
    state: watch::Receiver<SessionState>,
    task: Option<JoinHandle<SessionEnd>>,
}

impl Session {
    /// Resolve the bot identity, open the event socket and start listening.
    pub async fn open(
        id: u64,
        transport: Arc<dyn ChatTransport>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        let (state_tx, state) = watch::channel(SessionState::Connecting);
        debug!(session = id, "Connecting");

        let user = transport.get_me().await.map_err(connect_error)?;
        let events = transport.open_events().await.map_err(connect_error)?;

        state_tx.send_replace(SessionState::Listening);
        info!(session = id, user = %user.username, "Session listening");

        let closer = CancellationToken::new();
        let task = tokio::spawn(listen(
            id,
            events,
            dispatcher,
            user.id.clone(),
            closer.clone(),
            state_tx,
        ));

        Ok(Self {
            id,
            user,
            closer,
            state,
            task: Some(task),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The account this session is logged in as.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Ask the listen loop to stop. Never blocks; calling it again, or on a
    /// session that already failed, does nothing.
    pub fn close(&self) {
        self.closer.cancel();
    }

    /// Wait for the listen loop to stop.
    ///
    /// Cancel-safe. Once the end has been returned, later calls return
    /// `SessionEnd::Closed` immediately.
    pub async fn wait(&mut self) -> SessionEnd {
        let Some(task) = self.task.as_mut() else {
            return SessionEnd::Closed;
        };
        let end = match task.await {
            Ok(end) => end,
            Err(e) => SessionEnd::Failed(BridgeError::Listen(format!(
                "listen task aborted: {}",
                e
            ))),
        };
        self.task = None;
        end
    }

    /// Close and wait for the socket to be released.
    pub async fn shutdown(mut self) -> SessionEnd {
        self.close();
        self.wait().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.closer.cancel();
    }
}

fn connect_error(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Connect(_) => err,
        other => BridgeError::Connect(other.to_string()),
    }
}

async fn listen(
    id: u64,
    mut events: EventStream,
    dispatcher: Arc<Dispatcher>,
    bot_user_id: String,
    closer: CancellationToken,
    state: watch::Sender<SessionState>,
) -> SessionEnd {
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = closer.cancelled() => break SessionEnd::Closed,
            next = events.next() => next,
        };

        match next {
            // A received event is always handled to the end; close is
            // checked again before the next receive.
            Some(Ok(event)) => dispatcher.dispatch(&event, &bot_user_id).await,
            Some(Err(e)) => break SessionEnd::Failed(e),
            None => {
                break SessionEnd::Failed(BridgeError::Listen("event stream ended".into()))
            }
        }
    };

    match &end {
        SessionEnd::Closed => {
            state.send_replace(SessionState::Closing);
            drop(events);
            state.send_replace(SessionState::Disconnected);
            info!(session = id, "Session closed");
        }
        SessionEnd::Failed(e) => {
            drop(events);
            state.send_replace(SessionState::Failed);
            warn!(session = id, error = %e, "Session failed");
        }
    }
    end
}
