use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use workboard_api::Alarm;
use workboard_common::{ApiError, EntityId, UiEvent, WorkboardError};
use workboard_realtime::{alarms_endpoint, AlarmFeed, ChannelState, NotificationChannel};

use super::{now, stdin_lines};
use crate::cli::AlarmAction;
use crate::context::Context;

pub async fn run(ctx: &Context, action: AlarmAction) -> Result<(), WorkboardError> {
    match action {
        AlarmAction::List { unread } => list(ctx, unread).await,
        AlarmAction::Watch => watch(ctx).await,
        AlarmAction::Read { id } => {
            ctx.api.mark_alarm_read(&EntityId::new(id.as_str())).await?;
            println!("alarm {id} marked read");
            Ok(())
        }
        AlarmAction::ReadAll => {
            ctx.api.mark_all_alarms_read().await?;
            println!("all alarms marked read");
            Ok(())
        }
    }
}

async fn list(ctx: &Context, unread_only: bool) -> Result<(), WorkboardError> {
    let alarms = if unread_only {
        ctx.api.unread_alarms().await?
    } else {
        ctx.api.alarms().await?
    };
    if alarms.is_empty() {
        println!("no alarms");
    }
    for alarm in &alarms {
        println!("{}", render(alarm));
    }
    Ok(())
}

fn render(alarm: &Alarm) -> String {
    let mark = if alarm.is_read { ' ' } else { '*' };
    let kind = alarm.kind.as_deref().unwrap_or("ALARM");
    let when = alarm.created_at.as_deref().unwrap_or("-");
    format!("{mark} {:<8} {kind:<10} {when:<20} {}", alarm.id.as_str(), alarm.content)
}

/// Stream alarms until Ctrl-C or the stream ends for good.
async fn watch(ctx: &Context) -> Result<(), WorkboardError> {
    let (_, token) = ctx.signed_in()?;
    let endpoint = alarms_endpoint(ctx.client.origin(), &ctx.config.realtime)?;
    let channel = NotificationChannel::from_config(&ctx.config.realtime)?;

    let feed = Arc::new(AlarmFeed::new(ctx.events.clone()));
    if let Err(e) = feed.sync(&ctx.api).await {
        warn!(error = %e, "could not load unread count");
    }
    println!("{} unread; watching {endpoint} (Ctrl-C to stop)", feed.unread());

    let mut events = ctx.events.subscribe();
    let subscription = channel.open(endpoint, Some(token), feed.handler());
    let mut state = subscription.watch_state();

    let mut lines = stdin_lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            line = lines.recv(), if stdin_open => {
                let Some(line) = line else {
                    stdin_open = false;
                    continue;
                };
                match line.trim().strip_prefix("read ").map(str::trim) {
                    Some(id) if !id.is_empty() => {
                        match feed.acknowledge(&ctx.api, &EntityId::new(id)).await {
                            Ok(()) => println!("[{}] {id} read", now()),
                            Err(e) => eprintln!("cannot mark {id} read: {}", e.user_message()),
                        }
                    }
                    _ => eprintln!("commands: read <id>"),
                }
            }
            event = events.recv() => match event {
                Ok(UiEvent::AlarmReceived { content, .. }) => println!("[{}] {content}", now()),
                Ok(UiEvent::UnreadCountChanged(n)) => println!("[{}] {n} unread", now()),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "display fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "alarm stream");
                let retries = channel.policy().delay(0).is_some();
                if current.is_terminal() && !retries {
                    break Err(WorkboardError::Other(format!("alarm stream {current}")));
                }
                // A rejected token is never retried; find out before waiting forever.
                if current == ChannelState::Error {
                    if let Err(e @ ApiError::AuthInvalid) = ctx.session.guard().check().await {
                        break Err(e.into());
                    }
                }
            }
        }
    };

    subscription.close();
    result
}
