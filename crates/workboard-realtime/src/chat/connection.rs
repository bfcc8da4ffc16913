//! STOMP handshake and the background socket task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use workboard_common::{new_id, ApiError};

use super::message::Delivery;
use crate::state::{self, ChannelState};
use crate::stomp::{Command, Frame};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, WsMessage>;

pub(crate) type MessageHandler = Arc<dyn Fn(Delivery) + Send + Sync>;

/// A live subscription, kept so a reconnect can SUBSCRIBE again.
pub(crate) struct SubscriptionEntry {
    pub(crate) destination: String,
    pub(crate) handler: MessageHandler,
}

pub(crate) type Registry = Arc<Mutex<HashMap<String, SubscriptionEntry>>>;

/// Commands sent to the socket task from the channel handle.
#[derive(Debug)]
pub(crate) enum ChatCommand {
    Frame(Frame),
    Disconnect(oneshot::Sender<()>),
}

pub(crate) fn subscribe_frame(id: &str, destination: &str) -> Frame {
    Frame::new(Command::Subscribe)
        .header("id", id)
        .header("destination", destination)
        .header("ack", "auto")
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Open the socket and exchange CONNECT/CONNECTED.
pub(crate) async fn handshake(
    endpoint: &Url,
    auth_headers: &[(String, String)],
    heartbeat: Duration,
) -> Result<WsStream, ApiError> {
    let request = endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| ApiError::InvalidRequest(format!("bad chat endpoint: {e}")))?;
    let (mut ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let mut connect = Frame::new(Command::Connect)
        .header("accept-version", "1.2")
        .header("host", endpoint.host_str().unwrap_or("localhost"))
        .header("heart-beat", format!("{},0", heartbeat.as_millis()));
    for (name, value) in auth_headers {
        connect = connect.header(name.as_str(), value.as_str());
    }
    ws.send(WsMessage::Text(connect.encode().into()))
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    while let Some(msg) = ws.next().await {
        let text = match msg.map_err(|e| ApiError::Network(e.to_string()))? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let frame = match Frame::decode(text.as_str()) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => return Err(ApiError::Parse(e.to_string())),
        };
        match frame.command {
            Command::Connected => {
                debug!(version = frame.get("version").unwrap_or("?"), "STOMP session established");
                return Ok(ws);
            }
            Command::Error => {
                let message = frame.get("message").unwrap_or(&frame.body).to_string();
                return Err(ApiError::Network(format!("broker refused connection: {message}")));
            }
            other => {
                return Err(ApiError::Parse(format!("unexpected {other} during handshake")));
            }
        }
    }
    Err(ApiError::Network("socket closed during handshake".into()))
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

/// Owns the socket until the handle disconnects or the transport fails.
/// Transport failure leaves the channel in `Error`; nothing reconnects here.
pub(crate) async fn connection_task(
    ws: WsStream,
    mut commands: mpsc::Receiver<ChatCommand>,
    registry: Registry,
    state_tx: Arc<watch::Sender<ChannelState>>,
    heartbeat: Duration,
) {
    let (mut write, mut read) = ws.split();
    let beating = !heartbeat.is_zero();
    let mut ticker = tokio::time::interval(heartbeat.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChatCommand::Frame(frame)) => {
                    if let Err(e) = write.send(WsMessage::Text(frame.encode().into())).await {
                        warn!(error = %e, command = %frame.command, "chat send failed");
                        state::advance(&state_tx, ChannelState::Error);
                        return;
                    }
                }
                Some(ChatCommand::Disconnect(done)) => {
                    close_gracefully(&mut write).await;
                    state_tx.send_replace(ChannelState::Closed);
                    let _ = done.send(());
                    return;
                }
                None => {
                    close_gracefully(&mut write).await;
                    return;
                }
            },
            incoming = read.next() => {
                if !handle_incoming(incoming, &registry) {
                    state::advance(&state_tx, ChannelState::Error);
                    return;
                }
            }
            _ = ticker.tick(), if beating => {
                if write.send(WsMessage::Text(String::from("\n").into())).await.is_err() {
                    warn!("chat heart-beat failed");
                    state::advance(&state_tx, ChannelState::Error);
                    return;
                }
            }
        }
    }
}

async fn close_gracefully(write: &mut WsWrite) {
    let disconnect = Frame::new(Command::Disconnect).header("receipt", new_id());
    let _ = write.send(WsMessage::Text(disconnect.encode().into())).await;
    let _ = write.send(WsMessage::Close(None)).await;
    info!("chat socket closed");
}

/// Returns `false` when the transport is gone.
fn handle_incoming(
    incoming: Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>,
    registry: &Registry,
) -> bool {
    let text = match incoming {
        Some(Ok(WsMessage::Text(text))) => text,
        Some(Ok(WsMessage::Close(_))) | None => {
            info!("chat broker closed the connection");
            return false;
        }
        Some(Ok(_)) => return true,
        Some(Err(e)) => {
            warn!(error = %e, "chat socket error");
            return false;
        }
    };

    let frame = match Frame::decode(text.as_str()) {
        Ok(Some(frame)) => frame,
        Ok(None) => return true,
        Err(e) => {
            warn!(error = %e, "dropping undecodable STOMP frame");
            return true;
        }
    };

    match frame.command {
        Command::Message => dispatch(frame, registry),
        Command::Receipt => debug!(receipt = frame.get("receipt-id").unwrap_or(""), "receipt"),
        Command::Error => {
            warn!(
                message = frame.get("message").unwrap_or(""),
                body = %frame.body,
                "broker reported an error"
            );
            return false;
        }
        other => debug!(command = %other, "ignoring frame"),
    }
    true
}

fn dispatch(frame: Frame, registry: &Registry) {
    let Some(subscription) = frame.get("subscription").map(str::to_string) else {
        debug!("MESSAGE without subscription header");
        return;
    };
    let handler = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&subscription)
        .map(|entry| Arc::clone(&entry.handler));
    let Some(handler) = handler else {
        debug!(subscription = %subscription, "MESSAGE for unknown subscription");
        return;
    };
    handler(Delivery {
        destination: frame.get("destination").unwrap_or_default().to_string(),
        message_id: frame.get("message-id").map(str::to_string),
        subscription,
        body: frame.body,
    });
}
