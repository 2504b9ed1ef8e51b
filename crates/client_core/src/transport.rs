//! Collaborator seams for the live session: the persistent event connection and the
//! request/response facility, plus their websocket and HTTP implementations.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::json;
use shared::{
    domain::Role,
    protocol::{step, AuthorizePayload, QuizNamePayload, SessionMessage},
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

const EVENT_BUFFER: usize = 1024;

/// A role-scoped channel to the session server.
///
/// Inbound frames are fanned out to current subscribers only; frames emitted while nobody is
/// subscribed are lost.
#[async_trait]
pub trait SessionConnection: Send + Sync {
    async fn authorize(&self, quiz_name: &str, role: Role) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<SessionMessage>;
    async fn send(&self, message: SessionMessage) -> Result<()>;
}

/// Request/response calls against the session server. Every call answers with the same
/// envelope the socket uses.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn current_state(&self, quiz_name: &str) -> Result<SessionMessage>;
    async fn start_question(&self, quiz_name: &str) -> Result<SessionMessage>;
    async fn request_reading_confirmation(&self, quiz_name: &str) -> Result<SessionMessage>;
    async fn reset_session(&self, quiz_name: &str) -> Result<SessionMessage>;
}

pub struct HttpSessionApi {
    http: Client,
    api_url: String,
}

impl HttpSessionApi {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_url)
    }

    pub fn with_client(http: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { http, api_url }
    }

    async fn read_envelope(response: reqwest::Response) -> Result<SessionMessage> {
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_quiz_name(&self, route: &str, quiz_name: &str) -> Result<SessionMessage> {
        let url = format!("{}/quiz/{route}", self.api_url);
        let response = self
            .http
            .post(&url)
            .json(&QuizNamePayload {
                quiz_name: quiz_name.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        Self::read_envelope(response)
            .await
            .with_context(|| format!("POST {url} failed"))
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn current_state(&self, quiz_name: &str) -> Result<SessionMessage> {
        let url = format!("{}/quiz/currentState/{quiz_name}", self.api_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        Self::read_envelope(response)
            .await
            .with_context(|| format!("GET {url} failed"))
    }

    async fn start_question(&self, quiz_name: &str) -> Result<SessionMessage> {
        self.post_quiz_name("start", quiz_name).await
    }

    async fn request_reading_confirmation(&self, quiz_name: &str) -> Result<SessionMessage> {
        self.post_quiz_name("reading-confirmation", quiz_name).await
    }

    async fn reset_session(&self, quiz_name: &str) -> Result<SessionMessage> {
        let url = format!("{}/quiz/reset/{quiz_name}", self.api_url);
        let response = self
            .http
            .patch(&url)
            .json(&json!({}))
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        Self::read_envelope(response)
            .await
            .with_context(|| format!("PATCH {url} failed"))
    }
}

/// Secrets presented when authorizing the socket.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCredentials {
    /// Owner proof for quizzes created on this machine.
    pub private_key: Option<String>,
    pub nickname: Option<String>,
}

impl ConnectionCredentials {
    pub fn authorize_message(&self, quiz_name: &str, role: Role) -> Result<SessionMessage> {
        let (step, payload) = match role {
            Role::Owner => {
                let private_key = self
                    .private_key
                    .clone()
                    .ok_or_else(|| anyhow!("owner authorization requires a private key"))?;
                (
                    step::AUTHORIZE_AS_OWNER,
                    AuthorizePayload {
                        quiz_name: quiz_name.to_string(),
                        private_key: Some(private_key),
                        nickname: None,
                    },
                )
            }
            Role::Attendee => (
                step::AUTHORIZE,
                AuthorizePayload {
                    quiz_name: quiz_name.to_string(),
                    private_key: None,
                    nickname: self.nickname.clone(),
                },
            ),
        };
        Ok(SessionMessage::new(step, serde_json::to_value(payload)?))
    }
}

/// Turns an `http(s)://` API address into the matching `ws(s)://` socket address.
pub fn websocket_url_for(api_url: &str) -> Result<Url> {
    let mut url = Url::parse(api_url).with_context(|| format!("invalid api url: {api_url}"))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("unsupported url scheme: {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {api_url} to {scheme}"))?;
    url.set_path("");
    url.set_query(None);
    Ok(url)
}

pub struct WebSocketConnection {
    outbound: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<SessionMessage>,
    credentials: ConnectionCredentials,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WebSocketConnection {
    pub async fn connect(ws_url: &Url, credentials: ConnectionCredentials) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(err) = ws_writer.send(frame).await {
                    warn!("websocket: send failed: {err}");
                    break;
                }
            }
        });

        let inbound = events.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SessionMessage>(&text) {
                        Ok(message) => {
                            debug!(step = %message.step, "websocket: received frame");
                            // No subscribers means nobody is listening yet; the frame is lost.
                            let _ = inbound.send(message);
                        }
                        Err(err) => warn!("websocket: invalid session frame: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("websocket: receive failed: {err}");
                        break;
                    }
                }
            }
            info!("websocket: connection closed");
        });

        info!(url = %ws_url, "websocket: connected");
        Ok(Arc::new(Self {
            outbound,
            events,
            credentials,
            reader,
            writer,
        }))
    }
}

#[async_trait]
impl SessionConnection for WebSocketConnection {
    async fn authorize(&self, quiz_name: &str, role: Role) -> Result<()> {
        let message = self.credentials.authorize_message(quiz_name, role)?;
        self.send(message).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionMessage> {
        self.events.subscribe()
    }

    async fn send(&self, message: SessionMessage) -> Result<()> {
        let text = serde_json::to_string(&message)?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| anyhow!("websocket writer is closed"))
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
