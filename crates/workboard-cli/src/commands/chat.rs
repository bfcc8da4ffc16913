use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use workboard_common::{ApiError, EntityId, UiEvent, WorkboardError};
use workboard_realtime::{
    chat_endpoint, ChannelState, ChatChannel, ChatHistory, ChatHistoryConfig, ChatOptions,
    ChatRoom, Topic,
};

use super::{now, stdin_lines};
use crate::cli::ChatArgs;
use crate::context::Context;

const QUIT: &str = "/quit";

pub async fn run(ctx: &Context, args: ChatArgs) -> Result<(), WorkboardError> {
    let topic = match (args.issue, args.task) {
        (Some(issue), _) => Topic::Issue(EntityId::new(issue)),
        (None, Some(task)) => Topic::Task(EntityId::new(task)),
        (None, None) => return Err(WorkboardError::Other("pick --issue or --task".to_string())),
    };
    let (me, token) = ctx.signed_in()?;

    let endpoint = chat_endpoint(ctx.client.origin(), &ctx.config.realtime)?;
    let channel = Arc::new(
        ChatChannel::open(
            endpoint,
            ChatChannel::bearer_headers(&token),
            ChatOptions::from_config(&ctx.config.realtime),
        )
        .await?,
    );
    let history = Arc::new(Mutex::new(ChatHistory::new(ChatHistoryConfig::default())));
    let mut events = ctx.events.subscribe();
    let room = ChatRoom::join(
        Arc::clone(&channel),
        topic.clone(),
        me.clone(),
        history,
        ctx.events.clone(),
    )
    .await?;

    let writable = topic.publish_destination().is_some();
    if writable {
        println!("joined {topic} as {me}; type to send, {QUIT} to leave");
    } else {
        println!("following {topic} (receive-only); {QUIT} or EOF to leave");
    }

    let mut lines = stdin_lines();
    let mut state = channel.watch_state();
    let result = loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break Ok(()) };
                let line = line.trim();
                if line == QUIT {
                    break Ok(());
                }
                if line.is_empty() {
                    continue;
                }
                match room.send(line).await {
                    Ok(()) => {}
                    Err(e @ ApiError::InvalidRequest(_)) => eprintln!("{e}"),
                    Err(e) => break Err(e.into()),
                }
            }
            event = events.recv() => match event {
                Ok(UiEvent::ChatMessage { from, text, .. }) => {
                    let who = if from == me { "me".to_string() } else { from.to_string() };
                    println!("[{}] {who}: {text}", now());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "display fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *state.borrow_and_update();
                if current == ChannelState::Error {
                    info!("chat connection lost; reconnecting");
                    if let Err(e) = channel.reconnect().await {
                        break Err(e.into());
                    }
                    println!("reconnected");
                }
            }
        }
    };

    if let Err(e) = room.leave().await {
        warn!(error = %e, "could not unsubscribe cleanly");
    }
    channel.disconnect().await;
    result
}
