//! Alarm event stream over Server-Sent Events.
//!
//! [`NotificationChannel::open`] starts a background task that holds the
//! HTTP stream and hands each decoded event to the handler. The returned
//! [`Subscription`] owns that task: closing it (or dropping it) revokes the
//! handler before the transport is torn down, so nothing is delivered after
//! `close` returns.

use std::ops::ControlFlow;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use workboard_api::types::Alarm;
use workboard_common::ApiError;
use workboard_config::RealtimeConfig;

use crate::reconnect::ReconnectPolicy;
use crate::sse::{self, SseEvent};
use crate::state::ChannelState;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A server-pushed event, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The server's greeting sent right after the stream opens.
    Connected,
    Alarm(Alarm),
    Other { kind: String, data: Value },
}

impl RealtimeEvent {
    pub fn from_sse(event: &SseEvent) -> Result<Self, ApiError> {
        match event.kind() {
            "alarm" => serde_json::from_str(&event.data)
                .map(Self::Alarm)
                .map_err(|e| ApiError::Parse(format!("alarm payload: {e}"))),
            "connect" | "connected" => Ok(Self::Connected),
            kind => {
                let data = serde_json::from_str(&event.data)
                    .unwrap_or_else(|_| Value::String(event.data.clone()));
                Ok(Self::Other {
                    kind: kind.to_string(),
                    data,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Opens alarm subscriptions.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    http: reqwest::Client,
    policy: ReconnectPolicy,
}

impl NotificationChannel {
    /// The client has a connect timeout but no overall timeout; the stream
    /// is expected to stay open indefinitely.
    pub fn new(connect_timeout: Duration, policy: ReconnectPolicy) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, policy })
    }

    pub fn from_config(config: &RealtimeConfig) -> Result<Self, ApiError> {
        Self::new(
            Duration::from_secs(config.connect_timeout_secs.into()),
            ReconnectPolicy::from_config(&config.reconnect),
        )
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Start streaming `endpoint`. `token` is captured now; a later login
    /// needs a new subscription.
    pub fn open<H>(&self, endpoint: Url, token: Option<String>, handler: H) -> Subscription
    where
        H: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        let delivery = Arc::new(Delivery::new(Arc::new(handler)));
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let state_tx = Arc::new(state_tx);

        let task = tokio::spawn(stream_loop(
            self.http.clone(),
            endpoint.clone(),
            token,
            self.policy,
            Arc::clone(&delivery),
            Arc::clone(&state_tx),
        ));

        Subscription {
            endpoint,
            delivery,
            state_tx,
            state_rx,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Resolve the alarm stream URL against the API origin.
pub fn alarms_endpoint(origin: &Url, config: &RealtimeConfig) -> Result<Url, ApiError> {
    origin
        .join(&config.alarms_path)
        .map_err(|e| ApiError::InvalidRequest(format!("bad alarms path: {e}")))
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

type Handler = Arc<dyn Fn(RealtimeEvent) + Send + Sync>;

struct Slot {
    handler: Option<Handler>,
    running_on: Option<ThreadId>,
}

/// The handler slot shared by a subscription and its task. The handler is
/// called outside the lock, so it may close its own subscription. A `revoke`
/// from any other thread waits for a running call to finish; once it
/// returns no call is running there and none will start.
struct Delivery {
    slot: Mutex<Slot>,
    idle: Condvar,
}

impl Delivery {
    fn new(handler: Handler) -> Self {
        Self {
            slot: Mutex::new(Slot {
                handler: Some(handler),
                running_on: None,
            }),
            idle: Condvar::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, event: RealtimeEvent) -> ControlFlow<()> {
        let handler = {
            let mut slot = self.slot();
            let Some(handler) = slot.handler.clone() else {
                return ControlFlow::Break(());
            };
            slot.running_on = Some(thread::current().id());
            handler
        };

        handler(event);

        let revoked = {
            let mut slot = self.slot();
            slot.running_on = None;
            slot.handler.is_none()
        };
        self.idle.notify_all();
        if revoked {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn revoke(&self) -> bool {
        let mut slot = self.slot();
        let had = slot.handler.take().is_some();
        let me = thread::current().id();
        while slot.running_on.is_some_and(|t| t != me) {
            slot = self.idle.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        had
    }

    fn is_revoked(&self) -> bool {
        self.slot().handler.is_none()
    }

    /// Publish a task-driven state change unless the owner has closed.
    fn transition(&self, state: &watch::Sender<ChannelState>, next: ChannelState) {
        let slot = self.slot();
        if slot.handler.is_some() {
            state.send_replace(next);
        }
    }
}

/// One open alarm stream. Must be closed by its owner; dropping it closes it.
pub struct Subscription {
    endpoint: Url,
    delivery: Arc<Delivery>,
    state_tx: Arc<watch::Sender<ChannelState>>,
    state_rx: watch::Receiver<ChannelState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.delivery.is_revoked()
    }

    /// Stop delivery and release the transport. Safe to call repeatedly.
    pub fn close(&self) {
        let revoked = self.delivery.revoke();
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.state_tx.send_replace(ChannelState::Closed);
        if revoked {
            info!(endpoint = %self.endpoint, "alarm subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("endpoint", &self.endpoint.as_str())
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Stream task
// ---------------------------------------------------------------------------

async fn stream_loop(
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    policy: ReconnectPolicy,
    delivery: Arc<Delivery>,
    state_tx: Arc<watch::Sender<ChannelState>>,
) {
    let mut attempt = 0u32;
    loop {
        delivery.transition(&state_tx, ChannelState::Connecting);
        info!(endpoint = %endpoint, "opening alarm stream");

        let result = stream_once(
            &http,
            &endpoint,
            token.as_deref(),
            &delivery,
            &state_tx,
            &mut attempt,
        )
        .await;
        if delivery.is_revoked() {
            return;
        }
        let retryable = match result {
            Ok(()) => {
                info!(endpoint = %endpoint, "alarm stream ended by server");
                delivery.transition(&state_tx, ChannelState::Closed);
                true
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "alarm stream failed");
                delivery.transition(&state_tx, ChannelState::Error);
                !matches!(e, ApiError::AuthInvalid)
            }
        };

        let Some(delay) = policy.delay(attempt).filter(|_| retryable) else {
            return;
        };
        attempt = attempt.saturating_add(1);
        info!(delay_ms = delay.as_millis() as u64, attempt, "reopening alarm stream");
        tokio::time::sleep(delay).await;
        if delivery.is_revoked() {
            return;
        }
    }
}

async fn stream_once(
    http: &reqwest::Client,
    endpoint: &Url,
    token: Option<&str>,
    delivery: &Delivery,
    state_tx: &watch::Sender<ChannelState>,
    attempt: &mut u32,
) -> Result<(), ApiError> {
    let mut request = http
        .get(endpoint.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::AuthInvalid);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::RemoteRejected {
            status: status.as_u16(),
            message,
        });
    }

    delivery.transition(state_tx, ChannelState::Open);
    *attempt = 0;
    info!(endpoint = %endpoint, "alarm stream open");

    sse::read_events(response, |event| match RealtimeEvent::from_sse(&event) {
        Ok(decoded) => {
            debug!(kind = event.kind(), "alarm stream event");
            delivery.deliver(decoded)
        }
        Err(e) => {
            warn!(error = %e, "dropping undecodable event");
            ControlFlow::Continue(())
        }
    })
    .await
}

#[cfg(test)]
mod tests;
