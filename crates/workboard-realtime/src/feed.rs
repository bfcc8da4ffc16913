//! Fan-out of pushed alarms to toasts, the unread badge, and the event bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};
use workboard_api::WorkboardApi;
use workboard_common::{ApiError, EntityId, EventBus, Toast, ToastQueue, UiEvent};

use crate::notification::RealtimeEvent;

pub struct AlarmFeed {
    toasts: Mutex<ToastQueue>,
    unread: AtomicUsize,
    events: EventBus,
}

impl AlarmFeed {
    pub fn new(events: EventBus) -> Self {
        Self::with_capacity(events, 16)
    }

    pub fn with_capacity(events: EventBus, toast_capacity: usize) -> Self {
        Self {
            toasts: Mutex::new(ToastQueue::new(toast_capacity)),
            unread: AtomicUsize::new(0),
            events,
        }
    }

    /// A subscription handler feeding this feed.
    pub fn handler(self: &Arc<Self>) -> impl Fn(RealtimeEvent) + Send + Sync + 'static {
        let feed = Arc::clone(self);
        move |event| feed.handle(&event)
    }

    pub fn handle(&self, event: &RealtimeEvent) {
        let alarm = match event {
            RealtimeEvent::Alarm(alarm) => alarm,
            RealtimeEvent::Connected => {
                debug!("alarm stream greeted");
                return;
            }
            RealtimeEvent::Other { kind, .. } => {
                debug!(kind = %kind, "ignoring non-alarm event");
                return;
            }
        };

        let title = alarm.kind.clone().unwrap_or_else(|| "Alarm".to_string());
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Toast::info(title, alarm.content.clone()).linked_to(alarm.id.clone()));
        self.events.publish(UiEvent::AlarmReceived {
            alarm_id: alarm.id.clone(),
            content: alarm.content.clone(),
        });
        if !alarm.is_read {
            let unread = self.unread.fetch_add(1, Ordering::SeqCst) + 1;
            self.events.publish(UiEvent::UnreadCountChanged(unread));
        }
    }

    pub fn unread(&self) -> usize {
        self.unread.load(Ordering::SeqCst)
    }

    pub fn set_unread(&self, count: usize) {
        if self.unread.swap(count, Ordering::SeqCst) != count {
            self.events.publish(UiEvent::UnreadCountChanged(count));
        }
    }

    /// One alarm was read elsewhere.
    pub fn mark_read(&self) {
        let previous = self
            .unread
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if let Ok(previous) = previous {
            self.events.publish(UiEvent::UnreadCountChanged(previous - 1));
        }
    }

    pub fn mark_all_read(&self) {
        self.set_unread(0);
    }

    /// Mark one alarm read on the backend, then drop its toast and lower
    /// the badge. Nothing changes locally when the backend refuses.
    pub async fn acknowledge(&self, api: &WorkboardApi, alarm: &EntityId) -> Result<(), ApiError> {
        api.mark_alarm_read(alarm).await?;
        let dismissed = self
            .toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dismiss(alarm);
        debug!(alarm_id = %alarm, dismissed, "alarm acknowledged");
        self.mark_read();
        Ok(())
    }

    /// Load the authoritative unread count.
    pub async fn sync(&self, api: &WorkboardApi) -> Result<usize, ApiError> {
        let count = api.unread_alarms().await?.len();
        self.set_unread(count);
        info!(unread = count, "alarm badge synced");
        Ok(count)
    }

    pub fn visible_toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visible()
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workboard_api::types::Alarm;

    fn alarm(id: u64, read: bool) -> RealtimeEvent {
        RealtimeEvent::Alarm(Alarm {
            id: EntityId::from(id),
            content: format!("alarm {id}"),
            kind: Some("INVITE".into()),
            is_read: read,
            created_at: None,
        })
    }

    #[tokio::test]
    async fn alarm_becomes_toast_badge_and_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let feed = Arc::new(AlarmFeed::new(bus));
        let handler = feed.handler();

        handler(alarm(1, false));

        let toasts = feed.visible_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "INVITE");
        assert_eq!(toasts[0].body, "alarm 1");
        assert_eq!(feed.unread(), 1);

        assert!(matches!(
            rx.recv().await.unwrap(),
            UiEvent::AlarmReceived { alarm_id, .. } if alarm_id == EntityId::from(1)
        ));
        assert!(matches!(rx.recv().await.unwrap(), UiEvent::UnreadCountChanged(1)));
    }

    #[test]
    fn already_read_alarm_leaves_badge() {
        let feed = AlarmFeed::new(EventBus::default());
        feed.handle(&alarm(2, true));
        assert_eq!(feed.unread(), 0);
        assert_eq!(feed.visible_toasts().len(), 1);
    }

    #[test]
    fn non_alarm_events_are_ignored() {
        let feed = AlarmFeed::new(EventBus::default());
        feed.handle(&RealtimeEvent::Connected);
        feed.handle(&RealtimeEvent::Other {
            kind: "ping".into(),
            data: serde_json::Value::Null,
        });
        assert!(feed.visible_toasts().is_empty());
    }

    #[test]
    fn badge_counting() {
        let feed = AlarmFeed::new(EventBus::default());
        feed.set_unread(3);
        feed.mark_read();
        assert_eq!(feed.unread(), 2);
        feed.mark_all_read();
        feed.mark_read();
        assert_eq!(feed.unread(), 0);
    }

    #[test]
    fn toast_queue_is_bounded() {
        let feed = AlarmFeed::with_capacity(EventBus::default(), 2);
        for id in 0..5 {
            feed.handle(&alarm(id, false));
        }
        let bodies: Vec<_> = feed.visible_toasts().into_iter().map(|t| t.body).collect();
        assert_eq!(bodies, ["alarm 3", "alarm 4"]);
        assert_eq!(feed.unread(), 5);
    }

    async fn api_with_read_route(status: axum::http::StatusCode) -> WorkboardApi {
        use axum::routing::put;
        use std::sync::Arc;
        use workboard_api::{AuthTokenStore, RequestClient};

        let router = axum::Router::new().route(
            "/api/alarms/{id}/read",
            put(move || async move { (status, axum::Json(serde_json::json!({"message": "gone"}))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let config = workboard_config::ApiConfig {
            origin,
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
        };
        let client = RequestClient::new(&config, Arc::new(AuthTokenStore::in_memory())).unwrap();
        WorkboardApi::new(Arc::new(client))
    }

    #[tokio::test]
    async fn acknowledge_dismisses_toast_and_lowers_badge() {
        let api = api_with_read_route(axum::http::StatusCode::OK).await;
        let feed = AlarmFeed::new(EventBus::default());
        feed.handle(&alarm(1, false));
        feed.handle(&alarm(2, false));

        feed.acknowledge(&api, &EntityId::from(1)).await.unwrap();

        let bodies: Vec<_> = feed.visible_toasts().into_iter().map(|t| t.body).collect();
        assert_eq!(bodies, ["alarm 2"]);
        assert_eq!(feed.unread(), 1);
    }

    #[tokio::test]
    async fn refused_acknowledge_changes_nothing() {
        let api = api_with_read_route(axum::http::StatusCode::NOT_FOUND).await;
        let feed = AlarmFeed::new(EventBus::default());
        feed.handle(&alarm(1, false));

        let err = feed.acknowledge(&api, &EntityId::from(1)).await.unwrap_err();
        assert_eq!(err.user_message(), "gone");
        assert_eq!(feed.visible_toasts().len(), 1);
        assert_eq!(feed.unread(), 1);
    }
}
