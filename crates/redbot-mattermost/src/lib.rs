// ABOUTME: Library root for redbot-mattermost.
// ABOUTME: Exports the session, dispatcher, supervisor and transport modules and the run() entry point.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod mattermost;
pub mod membership;
pub mod notification;
pub mod reference;
pub mod session;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{Config, MattermostConfig};
pub use dispatcher::Dispatcher;
pub use error::{BridgeError, Result};
pub use event::{EventKind, InboundEvent, Message};
pub use mattermost::MattermostClient;
pub use notification::{format_issue, OutboundNotification};
pub use reference::ReferenceExtractor;
pub use session::{Session, SessionEnd, SessionState};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use transport::ChatTransport;

use redbot_redmine::RedmineClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Run the bot with the given config path until a shutdown signal arrives.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    info!("redbot starting");

    let config = Config::load(config_path)?;
    info!(
        mattermost = %config.mattermost.url,
        redmine = %config.redmine.base_url(),
        thread_replies = config.mattermost.thread_replies,
        "Configuration loaded"
    );

    let redmine = Arc::new(RedmineClient::new(&config.redmine)?);
    let extractor = ReferenceExtractor::new(redmine.base_url())?;
    let transport: Arc<dyn ChatTransport> = Arc::new(MattermostClient::new(&config.mattermost)?);
    let dispatcher = Arc::new(Dispatcher::new(
        transport.clone(),
        redmine,
        extractor,
        config.mattermost.thread_replies,
    ));

    let supervisor = Supervisor::new(
        transport,
        dispatcher,
        SupervisorConfig::from(&config.mattermost),
    );
    let signals = tokio::spawn(watch_signals(supervisor.handle()));

    supervisor.run().await;
    signals.abort();

    info!("redbot stopped");
    Ok(())
}

/// SIGINT and SIGTERM stop the bot; SIGHUP forces a fresh websocket.
#[cfg(unix)]
async fn watch_signals(handle: SupervisorHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let installed = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    );
    let (mut interrupt, mut terminate, mut hangup) = match installed {
        (Ok(i), Ok(t), Ok(h)) => (i, t, h),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            error!(error = %e, "Failed to install signal handlers");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = terminate.recv() => {
                info!("Received terminate signal, shutting down");
                break;
            }
            _ = hangup.recv() => {
                info!("Received hangup signal, reconnecting");
                handle.rotate();
            }
        }
    }
    handle.shutdown();
}

#[cfg(not(unix))]
async fn watch_signals(handle: SupervisorHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down");
            handle.shutdown();
        }
        Err(e) => error!(error = %e, "Failed to install ctrl+c handler"),
    }
}
