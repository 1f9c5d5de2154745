// ABOUTME: Keeps exactly one session alive and reacts to shutdown, join and rotation stimuli.
// ABOUTME: A single task multiplexes timers, session end and external requests with tokio::select!.

use crate::config::MattermostConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::membership::{self, JoinReport};
use crate::session::{Session, SessionEnd};
use crate::transport::ChatTransport;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Backoff grows linearly up to this many reconnect delays.
const MAX_BACKOFF_STEPS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub join_interval: Duration,
    /// `None` disables forced socket rotation.
    pub rotation_interval: Option<Duration>,
    pub reconnect_delay: Duration,
}

impl From<&MattermostConfig> for SupervisorConfig {
    fn from(config: &MattermostConfig) -> Self {
        Self {
            join_interval: config.channel_join_interval(),
            rotation_interval: config.socket_lifetime(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

impl SupervisorConfig {
    /// Wait before connect attempt number `attempt + 1` after `attempt`
    /// consecutive failures.
    fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_delay * attempt.min(MAX_BACKOFF_STEPS)
    }
}

/// Requests the supervisor accepts from outside its task.
#[derive(Clone)]
pub struct SupervisorHandle {
    shutdown: CancellationToken,
    rotate: Arc<Notify>,
}

impl SupervisorHandle {
    /// Stop the supervisor. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Replace the current session with a fresh one.
    pub fn rotate(&self) {
        self.rotate.notify_one();
    }
}

/// Owns the session slot. Only `run` touches it.
pub struct Supervisor {
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<Dispatcher>,
    config: SupervisorConfig,
    shutdown: CancellationToken,
    rotate: Arc<Notify>,
    sessions_opened: u64,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: Arc<Dispatcher>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            config,
            shutdown: CancellationToken::new(),
            rotate: Arc::new(Notify::new()),
            sessions_opened: 0,
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            shutdown: self.shutdown.clone(),
            rotate: self.rotate.clone(),
        }
    }

    /// Run until shutdown. On return no session is open.
    pub async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        let rotate = self.rotate.clone();

        let mut join_tick = ticker(self.config.join_interval);
        let mut rotation_tick = self.config.rotation_interval.map(ticker);

        let mut session: Option<Session> = None;
        let mut sweep: Option<JoinHandle<JoinReport>> = None;
        let mut retry_at: Option<Instant> = None;
        let mut failures: u32 = 0;
        let mut connect_now = true;

        info!(
            join_interval = ?self.config.join_interval,
            rotation_interval = ?self.config.rotation_interval,
            "Supervisor started"
        );

        loop {
            if connect_now {
                connect_now = false;
                let opened = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    opened = self.open_session() => opened,
                };
                match opened {
                    Ok(fresh) => {
                        failures = 0;
                        retry_at = None;
                        if let Some(interval) = rotation_tick.as_mut() {
                            interval.reset();
                        }
                        session = Some(fresh);
                    }
                    Err(e) => {
                        failures += 1;
                        let delay = self.config.backoff(failures);
                        error!(attempt = failures, retry_in = ?delay, error = %e, "Cannot open session");
                        retry_at = Some(Instant::now() + delay);
                    }
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,

                end = session_end(&mut session) => {
                    let id = session.take().map(|s| s.id()).unwrap_or_default();
                    match end {
                        SessionEnd::Failed(e) => {
                            warn!(session = id, error = %e, "Session failed, reconnecting");
                        }
                        SessionEnd::Closed => {
                            warn!(session = id, "Session closed unexpectedly, reconnecting");
                        }
                    }
                    connect_now = true;
                }

                _ = sleep_until(retry_at) => {
                    retry_at = None;
                    connect_now = true;
                }

                _ = rotate.notified() => {
                    if let Some(old) = session.take() {
                        info!(session = old.id(), "Reconnect requested");
                        old.shutdown().await;
                        connect_now = true;
                    } else {
                        debug!("Reconnect requested while disconnected, waiting for retry");
                    }
                }

                _ = tick(&mut rotation_tick) => {
                    if let Some(old) = session.take() {
                        info!(session = old.id(), "Socket lifetime reached, rotating");
                        old.shutdown().await;
                        connect_now = true;
                    }
                }

                _ = join_tick.tick() => {
                    if sweep.as_ref().is_some_and(|task| !task.is_finished()) {
                        debug!("Previous channel join still running, skipping");
                        continue;
                    }
                    match session.as_ref().map(|s| s.user().clone()) {
                        Some(user) => {
                            let transport = self.transport.clone();
                            sweep = Some(tokio::spawn(async move {
                                membership::join_channels(transport.as_ref(), &user).await
                            }));
                        }
                        None => debug!("No active session, skipping channel join"),
                    }
                }
            }
        }

        if let Some(task) = sweep.take() {
            task.abort();
        }
        if let Some(active) = session.take() {
            info!(session = active.id(), "Closing session for shutdown");
            active.shutdown().await;
        }
        info!("Supervisor stopped");
    }

    async fn open_session(&mut self) -> Result<Session> {
        self.sessions_opened += 1;
        Session::open(
            self.sessions_opened,
            self.transport.clone(),
            self.dispatcher.clone(),
        )
        .await
    }
}

/// Interval whose first tick is one `period` from now. Missed ticks are
/// delayed, not burst.
fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn session_end(session: &mut Option<Session>) -> SessionEnd {
    match session {
        Some(session) => session.wait().await,
        None => std::future::pending().await,
    }
}
