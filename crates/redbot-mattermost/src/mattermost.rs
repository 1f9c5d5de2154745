// ABOUTME: Mattermost implementation of the chat transport.
// ABOUTME: REST v4 calls via reqwest and the event websocket via tokio-tungstenite.

use crate::config::MattermostConfig;
use crate::error::{BridgeError, Result};
use crate::event::InboundEvent;
use crate::notification::OutboundNotification;
use crate::transport::{Channel, ChatTransport, EventStream, Team, User};

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

const CHANNEL_PAGE_SIZE: usize = 100;

/// Mattermost REST + websocket client.
pub struct MattermostClient {
    http: reqwest::Client,
    api_base: String,
    ws_url: String,
    token: String,
}

impl MattermostClient {
    pub fn new(config: &MattermostConfig) -> Result<Self> {
        let base = Url::parse(config.url.trim())
            .map_err(|e| BridgeError::Config(format!("mattermost.url is invalid: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base(&base),
            ws_url: websocket_url(&base)?,
            token: config.token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MattermostClient {
    async fn open_events(&self) -> Result<EventStream> {
        debug!(url = %self.ws_url, "Opening Mattermost websocket");

        let (mut socket, _response) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| BridgeError::Connect(format!("websocket handshake failed: {}", e)))?;

        let challenge = serde_json::json!({
            "seq": 1,
            "action": "authentication_challenge",
            "data": { "token": self.token },
        });
        socket
            .send(WsMessage::Text(challenge.to_string().into()))
            .await
            .map_err(|e| BridgeError::Connect(format!("websocket authentication failed: {}", e)))?;

        info!("Mattermost websocket connected");
        Ok(socket
            .filter_map(|frame| future::ready(decode_frame(frame)))
            .boxed())
    }

    async fn get_me(&self) -> Result<User> {
        self.get_json("/users/me").await
    }

    async fn get_teams_for_user(&self, user_id: &str) -> Result<Vec<Team>> {
        self.get_json(&format!("/users/{}/teams", user_id)).await
    }

    async fn get_public_channels_for_team(&self, team_id: &str) -> Result<Vec<Channel>> {
        let mut channels = Vec::new();
        for page in 0.. {
            let batch: Vec<Channel> = self
                .get_json(&format!(
                    "/teams/{}/channels?page={}&per_page={}",
                    team_id, page, CHANNEL_PAGE_SIZE
                ))
                .await?;
            let last_page = batch.len() < CHANNEL_PAGE_SIZE;
            channels.extend(batch);
            if last_page {
                break;
            }
        }
        Ok(channels)
    }

    async fn get_channels_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<Channel>> {
        self.get_json(&format!("/users/{}/teams/{}/channels", user_id, team_id))
            .await
    }

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        self.post_json(
            &format!("/channels/{}/members", channel_id),
            &serde_json::json!({ "user_id": user_id }),
        )
        .await
    }

    async fn create_post(&self, notification: &OutboundNotification) -> Result<()> {
        self.post_json("/posts", &PostBody::from(notification)).await
    }
}

/// `{base}/api/v4` without a doubled slash.
fn api_base(base: &Url) -> String {
    format!("{}/api/v4", base.as_str().trim_end_matches('/'))
}

/// Websocket endpoint for a server URL: http→ws, https→wss, port and path kept.
fn websocket_url(base: &Url) -> Result<String> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(BridgeError::Config(format!(
                "unsupported mattermost.url scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| BridgeError::Config(format!("cannot derive websocket URL from {}", base)))?;
    let path = format!("{}/api/v4/websocket", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    Ok(url.to_string())
}

/// Map one websocket frame to a stream item, or `None` to skip it.
fn decode_frame(frame: std::result::Result<WsMessage, WsError>) -> Option<Result<InboundEvent>> {
    match frame {
        Ok(WsMessage::Text(text)) => match InboundEvent::from_frame(text.as_str()) {
            Ok(event) => event.map(Ok),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable websocket frame");
                None
            }
        },
        Ok(WsMessage::Close(frame)) => Some(Err(BridgeError::Listen(match frame {
            Some(frame) => format!(
                "server closed the socket: {} {}",
                u16::from(frame.code),
                frame.reason.as_str()
            ),
            None => "server closed the socket".to_string(),
        }))),
        Ok(_) => None,
        Err(e) => Some(Err(BridgeError::Listen(e.to_string()))),
    }
}

/// Error body returned by the REST API.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    Err(BridgeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Serialize)]
struct PostBody<'a> {
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_id: Option<&'a str>,
    message: &'a str,
    props: PostProps<'a>,
}

#[derive(Serialize)]
struct PostProps<'a> {
    attachments: Vec<Attachment<'a>>,
}

#[derive(Serialize)]
struct Attachment<'a> {
    color: &'a str,
    text: &'a str,
}

impl<'a> From<&'a OutboundNotification> for PostBody<'a> {
    fn from(notification: &'a OutboundNotification) -> Self {
        Self {
            channel_id: &notification.channel_id,
            root_id: notification.root_id.as_deref(),
            message: "",
            props: PostProps {
                attachments: vec![Attachment {
                    color: &notification.color,
                    text: &notification.text,
                }],
            },
        }
    }
}
