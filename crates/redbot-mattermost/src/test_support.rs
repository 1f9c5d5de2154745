// ABOUTME: In-memory chat transport and issue lookup used by unit tests.
// ABOUTME: Scripted sockets, recorded posts and memberships, and event builders.

use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::event::InboundEvent;
use crate::notification::OutboundNotification;
use crate::reference::ReferenceExtractor;
use crate::transport::{Channel, ChatTransport, EventStream, Team, User};

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use redbot_redmine::{Issue, IssueId, IssueLookup, RedmineError};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type SocketSender = UnboundedSender<Result<InboundEvent>>;

type ScriptedSocket = Option<futures::channel::mpsc::UnboundedReceiver<Result<InboundEvent>>>;

struct TeamFixture {
    id: String,
    public: Vec<String>,
    joined: Vec<String>,
}

/// Chat server double. Every `open_events` call takes the next scripted
/// socket; with none left it fails to connect.
#[derive(Default)]
pub struct FakeTransport {
    sockets: Mutex<VecDeque<ScriptedSocket>>,
    open_attempts: AtomicUsize,
    posts: Mutex<Vec<OutboundNotification>>,
    post_attempts: AtomicUsize,
    failing_posts: AtomicUsize,
    teams: Mutex<Vec<TeamFixture>>,
    teams_fail: Mutex<bool>,
    teams_delay: Mutex<Option<Duration>>,
    team_requests: AtomicUsize,
    failing_team_channels: Mutex<HashSet<String>>,
    failing_memberships: Mutex<HashSet<String>>,
    failing_adds: Mutex<HashSet<String>>,
    added: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a socket that opens successfully. Events sent on the returned
    /// sender are delivered; dropping it ends the stream.
    pub fn push_socket(&self) -> SocketSender {
        let (tx, rx) = unbounded();
        self.sockets.lock().unwrap().push_back(Some(rx));
        tx
    }

    pub fn push_connect_failure(&self) {
        self.sockets.lock().unwrap().push_back(None);
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Posts that were accepted.
    pub fn posts(&self) -> Vec<OutboundNotification> {
        self.posts.lock().unwrap().clone()
    }

    pub fn post_attempts(&self) -> usize {
        self.post_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_next_posts(&self, count: usize) {
        self.failing_posts.store(count, Ordering::SeqCst);
    }

    pub fn add_team(&self, id: &str, public: &[&str], joined: &[&str]) {
        self.teams.lock().unwrap().push(TeamFixture {
            id: id.to_string(),
            public: public.iter().map(|c| c.to_string()).collect(),
            joined: joined.iter().map(|c| c.to_string()).collect(),
        });
    }

    /// Every teams listing takes `delay` before answering.
    pub fn slow_teams(&self, delay: Duration) {
        *self.teams_delay.lock().unwrap() = Some(delay);
    }

    pub fn team_requests(&self) -> usize {
        self.team_requests.load(Ordering::SeqCst)
    }

    pub fn fail_teams(&self) {
        *self.teams_fail.lock().unwrap() = true;
    }

    pub fn fail_team_channels(&self, team_id: &str) {
        self.failing_team_channels
            .lock()
            .unwrap()
            .insert(team_id.to_string());
    }

    pub fn fail_memberships(&self, team_id: &str) {
        self.failing_memberships
            .lock()
            .unwrap()
            .insert(team_id.to_string());
    }

    pub fn fail_add_member(&self, channel_id: &str) {
        self.failing_adds
            .lock()
            .unwrap()
            .insert(channel_id.to_string());
    }

    /// `(channel_id, user_id)` pairs added successfully.
    pub fn added(&self) -> Vec<(String, String)> {
        self.added.lock().unwrap().clone()
    }

    fn channels(ids: &[String]) -> Vec<Channel> {
        ids.iter()
            .map(|id| Channel {
                id: id.clone(),
                name: format!("name-{}", id),
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn open_events(&self) -> Result<EventStream> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = self.sockets.lock().unwrap().pop_front();
        match scripted {
            Some(Some(rx)) => Ok(rx.boxed()),
            _ => Err(BridgeError::Connect("connection refused".into())),
        }
    }

    async fn get_me(&self) -> Result<User> {
        Ok(User {
            id: "bot".to_string(),
            username: "redbot".to_string(),
        })
    }

    async fn get_teams_for_user(&self, _user_id: &str) -> Result<Vec<Team>> {
        self.team_requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.teams_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.teams_fail.lock().unwrap() {
            return Err(BridgeError::Api {
                status: 500,
                message: "teams unavailable".into(),
            });
        }
        Ok(self
            .teams
            .lock()
            .unwrap()
            .iter()
            .map(|t| Team {
                id: t.id.clone(),
                name: format!("team-{}", t.id),
            })
            .collect())
    }

    async fn get_public_channels_for_team(&self, team_id: &str) -> Result<Vec<Channel>> {
        if self.failing_team_channels.lock().unwrap().contains(team_id) {
            return Err(BridgeError::Api {
                status: 403,
                message: "forbidden".into(),
            });
        }
        let teams = self.teams.lock().unwrap();
        let team = teams.iter().find(|t| t.id == team_id);
        Ok(team.map(|t| Self::channels(&t.public)).unwrap_or_default())
    }

    async fn get_channels_for_user(&self, _user_id: &str, team_id: &str) -> Result<Vec<Channel>> {
        if self.failing_memberships.lock().unwrap().contains(team_id) {
            return Err(BridgeError::Api {
                status: 500,
                message: "memberships unavailable".into(),
            });
        }
        let teams = self.teams.lock().unwrap();
        let team = teams.iter().find(|t| t.id == team_id);
        Ok(team.map(|t| Self::channels(&t.joined)).unwrap_or_default())
    }

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        if self.failing_adds.lock().unwrap().contains(channel_id) {
            return Err(BridgeError::Api {
                status: 403,
                message: "cannot join".into(),
            });
        }
        self.added
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn create_post(&self, notification: &OutboundNotification) -> Result<()> {
        self.post_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_posts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BridgeError::Api {
                status: 500,
                message: "post rejected".into(),
            });
        }
        self.posts.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
struct LookupState {
    calls: Vec<IssueId>,
    failing: HashSet<u64>,
    panicking: HashSet<u64>,
    delay: Option<Duration>,
}

/// Issue tracker double. Every id resolves to "Issue <id>" unless scripted
/// to fail or panic.
#[derive(Clone, Default)]
pub struct FakeLookup {
    state: Arc<Mutex<LookupState>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, id: u64) -> Self {
        self.state.lock().unwrap().failing.insert(id);
        self
    }

    pub fn panicking(self, id: u64) -> Self {
        self.state.lock().unwrap().panicking.insert(id);
        self
    }

    /// Every lookup takes `delay` before answering.
    pub fn slow(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Ids looked up so far, in call order.
    pub fn calls(&self) -> Vec<IssueId> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Dispatcher wired to `transport` and this lookup, tracker at `http://tracker`.
    pub fn dispatcher(transport: Arc<FakeTransport>, lookup: FakeLookup) -> Dispatcher {
        Dispatcher::new(
            transport,
            Arc::new(lookup),
            ReferenceExtractor::new("http://tracker").unwrap(),
            false,
        )
    }
}

#[async_trait]
impl IssueLookup for FakeLookup {
    async fn get_issue(&self, id: IssueId) -> redbot_redmine::Result<Issue> {
        let (fail, panic, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(id);
            (
                state.failing.contains(&id.get()),
                state.panicking.contains(&id.get()),
                state.delay,
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("lookup of issue {} exploded", id);
        }
        if fail {
            return Err(RedmineError::NotFound(id));
        }
        Ok(issue(id.get()))
    }
}

pub fn issue(id: u64) -> Issue {
    Issue {
        id: IssueId::new(id),
        subject: format!("Issue {}", id),
        project: "Core".to_string(),
        status: "Open".to_string(),
        tracker: None,
        category: None,
        version: None,
        assigned_to: None,
        priority: "Normal".to_string(),
        high_priority: false,
        closed: false,
        url: format!("http://tracker/issues/{}", id),
    }
}

/// A raw event of `kind` with the given data object.
pub fn event(kind: &str, data: Value) -> InboundEvent {
    let frame = json!({"event": kind, "data": data, "seq": 1}).to_string();
    InboundEvent::from_frame(&frame).unwrap().unwrap()
}

/// A top-level "posted" event.
pub fn posted(channel_id: &str, user_id: &str, text: &str) -> InboundEvent {
    posted_reply(channel_id, user_id, "", text)
}

/// A "posted" event inside the thread rooted at `root_id`.
pub fn posted_reply(channel_id: &str, user_id: &str, root_id: &str, text: &str) -> InboundEvent {
    let post = json!({
        "id": format!("post-{}", text.len()),
        "channel_id": channel_id,
        "root_id": root_id,
        "user_id": user_id,
        "message": text,
    });
    event("posted", json!({ "post": post.to_string() }))
}

/// Poll `condition` until it holds; panics after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
