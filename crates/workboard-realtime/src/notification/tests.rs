//! Alarm stream against a local SSE stub.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc};

use super::*;

#[derive(Clone)]
struct Stub {
    push: broadcast::Sender<(String, String)>,
    connections: Arc<AtomicUsize>,
}

fn frame(kind: &str, data: &str) -> String {
    format!("event: {kind}\ndata: {data}\n\n")
}

fn event_stream(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Greets, then forwards whatever the test pushes until the stub is dropped.
async fn live(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    stub.connections.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let rx = stub.push.subscribe();
    let greeting = stream::iter([
        Ok::<_, Infallible>(frame("connect", "ok")),
        Ok(frame("auth", &format!("\"{auth}\""))),
    ]);
    let pushed = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok((kind, data)) => Some((Ok(frame(&kind, &data)), rx)),
            Err(_) => None,
        }
    });
    event_stream(Body::from_stream(greeting.chain(pushed)))
}

/// One alarm, then end of stream.
async fn short(State(stub): State<Stub>) -> Response {
    stub.connections.fetch_add(1, Ordering::SeqCst);
    let body = frame("alarm", r#"{"alarmId":1,"content":"done","type":"TASK"}"#);
    event_stream(Body::from(body))
}

async fn denied() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

async fn serve() -> (Url, Stub) {
    let stub = Stub {
        push: broadcast::channel(16).0,
        connections: Arc::new(AtomicUsize::new(0)),
    };
    let router = Router::new()
        .route("/api/alarms/subscribe", get(live))
        .route("/short", get(short))
        .route("/denied", get(denied))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (Url::parse(&format!("http://{addr}")).unwrap(), stub)
}

fn collector() -> (
    impl Fn(RealtimeEvent) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<RealtimeEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (move |event| drop(tx.send(event)), rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<RealtimeEvent>) -> RealtimeEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event in time")
        .expect("handler dropped")
}

async fn reach(sub: &Subscription, wanted: ChannelState) {
    let mut state = sub.watch_state();
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == wanted))
        .await
        .expect("state not reached")
        .unwrap();
}

fn channel(policy: ReconnectPolicy) -> NotificationChannel {
    NotificationChannel::new(Duration::from_secs(2), policy).unwrap()
}

#[tokio::test]
async fn delivers_events_in_order_with_bearer_token() {
    let (origin, stub) = serve().await;
    let endpoint = alarms_endpoint(&origin, &RealtimeConfig::default()).unwrap();
    let (handler, mut rx) = collector();
    let sub = channel(ReconnectPolicy::Manual).open(endpoint, Some("T1".into()), handler);

    assert_eq!(next(&mut rx).await, RealtimeEvent::Connected);
    assert_eq!(
        next(&mut rx).await,
        RealtimeEvent::Other {
            kind: "auth".into(),
            data: Value::String("Bearer T1".into()),
        }
    );
    assert_eq!(sub.state(), ChannelState::Open);

    for id in 1..=3 {
        stub.push
            .send(("alarm".into(), format!(r#"{{"alarmId":{id},"content":"n{id}"}}"#)))
            .unwrap();
    }
    for id in 1..=3u64 {
        match next(&mut rx).await {
            RealtimeEvent::Alarm(alarm) => assert_eq!(alarm.content, format!("n{id}")),
            other => panic!("unexpected {other:?}"),
        }
    }
    sub.close();
}

#[tokio::test]
async fn no_delivery_after_close() {
    let (origin, stub) = serve().await;
    let (handler, mut rx) = collector();
    let sub = channel(ReconnectPolicy::Manual).open(
        origin.join("/api/alarms/subscribe").unwrap(),
        None,
        handler,
    );
    assert_eq!(next(&mut rx).await, RealtimeEvent::Connected);
    next(&mut rx).await;

    sub.close();
    assert!(sub.is_closed());
    assert_eq!(sub.state(), ChannelState::Closed);

    let _ = stub
        .push
        .send(("alarm".into(), r#"{"alarmId":9,"content":"late"}"#.into()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    sub.close();
    assert_eq!(sub.state(), ChannelState::Closed);
}

#[tokio::test]
async fn dropping_subscription_closes_it() {
    let (origin, stub) = serve().await;
    let (handler, mut rx) = collector();
    let sub = channel(ReconnectPolicy::Manual).open(
        origin.join("/api/alarms/subscribe").unwrap(),
        None,
        handler,
    );
    next(&mut rx).await;
    drop(sub);

    let _ = stub.push.send(("alarm".into(), r#"{"alarmId":2}"#.into()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_can_close_its_own_subscription() {
    let (origin, stub) = serve().await;
    let own: Arc<std::sync::Mutex<Option<Subscription>>> = Arc::default();
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    let handler = {
        let own = Arc::clone(&own);
        move |event| {
            if matches!(event, RealtimeEvent::Alarm(_)) {
                let taken = own.lock().unwrap().take();
                if let Some(sub) = taken {
                    let mut state = sub.watch_state();
                    sub.close();
                    drop(sub);
                    let _ = closed_tx.send(*state.borrow_and_update());
                }
            }
        }
    };
    let sub = channel(ReconnectPolicy::Manual).open(
        origin.join("/api/alarms/subscribe").unwrap(),
        None,
        handler,
    );
    reach(&sub, ChannelState::Open).await;
    let mut state = sub.watch_state();
    *own.lock().unwrap() = Some(sub);
    stub.push
        .send(("alarm".into(), r#"{"alarmId":1,"content":"stop"}"#.into()))
        .unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), closed_rx.recv())
        .await
        .expect("handler blocked while closing")
        .unwrap();
    assert_eq!(seen, ChannelState::Closed);
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == ChannelState::Closed))
        .await
        .expect("state not reached")
        .unwrap();

    assert!(own.lock().unwrap().is_none());
}

#[tokio::test]
async fn manual_policy_stays_closed_after_stream_ends() {
    let (origin, stub) = serve().await;
    let (handler, mut rx) = collector();
    let sub = channel(ReconnectPolicy::Manual).open(origin.join("/short").unwrap(), None, handler);

    match next(&mut rx).await {
        RealtimeEvent::Alarm(alarm) => assert_eq!(alarm.kind.as_deref(), Some("TASK")),
        other => panic!("unexpected {other:?}"),
    }
    reach(&sub, ChannelState::Closed).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backoff_policy_reopens() {
    let (origin, stub) = serve().await;
    let (handler, mut rx) = collector();
    let policy = ReconnectPolicy::Backoff {
        base: Duration::from_millis(10),
        max: Duration::from_millis(20),
    };
    let sub = channel(policy).open(origin.join("/short").unwrap(), None, handler);

    for _ in 0..3 {
        assert!(matches!(next(&mut rx).await, RealtimeEvent::Alarm(_)));
    }
    assert!(stub.connections.load(Ordering::SeqCst) >= 3);
    sub.close();
}

#[tokio::test]
async fn unauthorized_stream_errors_without_retry() {
    let (origin, _stub) = serve().await;
    let (handler, _rx) = collector();
    let policy = ReconnectPolicy::Backoff {
        base: Duration::from_millis(10),
        max: Duration::from_millis(10),
    };
    let sub = channel(policy).open(origin.join("/denied").unwrap(), Some("stale".into()), handler);
    reach(&sub, ChannelState::Error).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sub.state(), ChannelState::Error);
}

#[test]
fn undecodable_alarm_is_parse_error() {
    let event = SseEvent {
        event: Some("alarm".into()),
        data: "not json".into(),
        id: None,
    };
    assert!(matches!(RealtimeEvent::from_sse(&event), Err(ApiError::Parse(_))));
}

#[test]
fn unnamed_text_event_is_other_message() {
    let event = SseEvent {
        event: None,
        data: "hello".into(),
        id: None,
    };
    assert_eq!(
        RealtimeEvent::from_sse(&event).unwrap(),
        RealtimeEvent::Other {
            kind: "message".into(),
            data: Value::String("hello".into()),
        }
    );
}
