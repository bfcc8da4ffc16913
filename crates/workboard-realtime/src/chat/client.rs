//! Handle for the conversation socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::SinkExt;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use workboard_common::ApiError;
use workboard_config::RealtimeConfig;

use super::connection::{
    connection_task, handshake, subscribe_frame, ChatCommand, Registry, SubscriptionEntry,
};
use super::message::{Delivery, Topic};
use crate::state::ChannelState;
use crate::stomp::{Command, Frame};

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Interval of outgoing heart-beats; zero disables them.
    pub heartbeat: Duration,
    /// Bound on socket open plus CONNECT/CONNECTED.
    pub connect_timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}

impl ChatOptions {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.heartbeat_secs.into()),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.into()),
        }
    }
}

/// WebSocket URL of the broker for an HTTP API origin.
pub fn chat_endpoint(origin: &Url, config: &RealtimeConfig) -> Result<Url, ApiError> {
    let mut url = origin
        .join(&config.chat_path)
        .map_err(|e| ApiError::InvalidRequest(format!("bad chat path: {e}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| ApiError::InvalidRequest(format!("cannot use {scheme} for {url}")))?;
    Ok(url)
}

struct Link {
    commands: mpsc::Sender<ChatCommand>,
    task: JoinHandle<()>,
}

/// A publish/subscribe session with the chat broker.
///
/// The channel never reconnects on its own: after a transport failure it
/// sits in `Error` until the owner calls [`reconnect`](Self::reconnect).
pub struct ChatChannel {
    endpoint: Url,
    auth_headers: Vec<(String, String)>,
    options: ChatOptions,
    state_tx: Arc<watch::Sender<ChannelState>>,
    registry: Registry,
    link: Mutex<Option<Link>>,
    lifecycle: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl ChatChannel {
    /// A channel in `Init`; nothing is opened until [`connect`](Self::connect).
    pub fn new(endpoint: Url, auth_headers: Vec<(String, String)>, options: ChatOptions) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Init);
        Self {
            endpoint,
            auth_headers,
            options,
            state_tx: Arc::new(state_tx),
            registry: Arc::new(Mutex::new(HashMap::new())),
            link: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create and connect in one step.
    pub async fn open(
        endpoint: Url,
        auth_headers: Vec<(String, String)>,
        options: ChatOptions,
    ) -> Result<Self, ApiError> {
        let channel = Self::new(endpoint, auth_headers, options);
        channel.connect().await?;
        Ok(channel)
    }

    /// Headers carrying a bearer token on CONNECT.
    pub fn bearer_headers(token: &str) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), format!("Bearer {token}"))]
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, SubscriptionEntry>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the socket and run the STOMP handshake. Existing subscriptions
    /// are sent again before the channel reports `Open`. No-op when open.
    pub async fn connect(&self) -> Result<(), ApiError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state().is_open() {
            return Ok(());
        }
        if let Some(old) = self.link().take() {
            old.task.abort();
        }

        self.state_tx.send_replace(ChannelState::Connecting);
        info!(endpoint = %self.endpoint, "connecting chat channel");

        let opened = tokio::time::timeout(
            self.options.connect_timeout,
            handshake(&self.endpoint, &self.auth_headers, self.options.heartbeat),
        )
        .await
        .unwrap_or_else(|_| Err(ApiError::Network("chat handshake timed out".into())));
        let mut ws = match opened {
            Ok(ws) => ws,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "chat connect failed");
                self.state_tx.send_replace(ChannelState::Error);
                return Err(e);
            }
        };

        let resubscribe: Vec<Frame> = self
            .registry()
            .iter()
            .map(|(id, entry)| subscribe_frame(id, &entry.destination))
            .collect();
        for frame in &resubscribe {
            if let Err(e) = ws.send(WsMessage::Text(frame.encode().into())).await {
                self.state_tx.send_replace(ChannelState::Error);
                return Err(ApiError::Network(e.to_string()));
            }
        }
        if !resubscribe.is_empty() {
            info!(count = resubscribe.len(), "chat subscriptions restored");
        }

        let (commands, command_rx) = mpsc::channel(64);
        let task = tokio::spawn(connection_task(
            ws,
            command_rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.state_tx),
            self.options.heartbeat,
        ));
        *self.link() = Some(Link { commands, task });

        // The task may already have failed; its state wins over `Open`.
        let opened = self.state_tx.send_if_modified(|current| {
            if *current != ChannelState::Connecting {
                return false;
            }
            *current = ChannelState::Open;
            true
        });
        if !opened {
            let current = self.state();
            warn!(endpoint = %self.endpoint, state = %current, "chat connection lost during connect");
            return Err(ApiError::Network(format!("chat connection {current} during connect")));
        }
        info!(endpoint = %self.endpoint, "chat channel open");
        Ok(())
    }

    /// Explicit reconnect after `Error` or `Closed`; same as [`connect`](Self::connect).
    pub async fn reconnect(&self) -> Result<(), ApiError> {
        self.connect().await
    }

    /// Subscribe `handler` to a raw destination. Returns the subscription id.
    pub async fn subscribe<H>(&self, destination: &str, handler: H) -> Result<String, ApiError>
    where
        H: Fn(Delivery) + Send + Sync + 'static,
    {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry().insert(
            id.clone(),
            SubscriptionEntry {
                destination: destination.to_string(),
                handler: Arc::new(handler),
            },
        );
        if let Err(e) = self.send_frame(subscribe_frame(&id, destination)).await {
            self.registry().remove(&id);
            return Err(e);
        }
        debug!(id = %id, destination, "subscribed");
        Ok(id)
    }

    pub async fn subscribe_topic<H>(&self, topic: &Topic, handler: H) -> Result<String, ApiError>
    where
        H: Fn(Delivery) + Send + Sync + 'static,
    {
        self.subscribe(&topic.subscribe_destination(), handler).await
    }

    /// Drop a subscription. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: &str) -> Result<(), ApiError> {
        if self.registry().remove(id).is_none() {
            return Ok(());
        }
        if !self.state().is_open() {
            return Ok(());
        }
        self.send_frame(Frame::new(Command::Unsubscribe).header("id", id))
            .await
    }

    /// Fire-and-forget SEND of `payload` as JSON.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| ApiError::InvalidRequest(format!("unserializable payload: {e}")))?;
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(body);
        self.send_frame(frame).await
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), ApiError> {
        if !self.state().is_open() {
            return Err(ApiError::NotConnected);
        }
        let commands = self
            .link()
            .as_ref()
            .map(|link| link.commands.clone())
            .ok_or(ApiError::NotConnected)?;
        commands
            .send(ChatCommand::Frame(frame))
            .await
            .map_err(|_| ApiError::NotConnected)
    }

    /// Close the session and forget every subscription. Safe to call in any
    /// state and more than once.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let link = self.link().take();
        if let Some(link) = link {
            let (done, acked) = oneshot::channel();
            if link.commands.send(ChatCommand::Disconnect(done)).await.is_ok() {
                let _ = tokio::time::timeout(Duration::from_secs(2), acked).await;
            }
            link.task.abort();
            info!(endpoint = %self.endpoint, "chat channel disconnected");
        }
        self.registry().clear();
        self.state_tx.send_replace(ChannelState::Closed);
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        if let Some(link) = self.link().take() {
            link.task.abort();
        }
    }
}

impl std::fmt::Debug for ChatChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatChannel")
            .field("endpoint", &self.endpoint.as_str())
            .field("state", &self.state())
            .field("auth_headers", &"[REDACTED]")
            .finish()
    }
}
