//! One module per command family. Each prints to stdout and returns the
//! first error it cannot handle.

mod alarms;
mod auth;
mod chat;
mod tasks;
mod users;

use std::io::BufRead;

use tokio::sync::mpsc;
use workboard_common::WorkboardError;

use crate::cli::Command;
use crate::context::Context;

pub async fn dispatch(ctx: &Context, command: Command) -> Result<(), WorkboardError> {
    match command {
        Command::Login { user_id, password } => auth::login(ctx, &user_id, password).await,
        Command::Logout => auth::logout(ctx),
        Command::Whoami => auth::whoami(ctx).await,
        Command::SearchUsers {
            keyword,
            exclude,
            interactive,
        } => users::search(ctx, keyword, exclude, interactive).await,
        Command::Alarms { action } => alarms::run(ctx, action).await,
        Command::Tasks { action } => tasks::run(ctx, action).await,
        Command::Chat(args) => chat::run(ctx, args).await,
        Command::ShowConfig => {
            println!("{}", workboard_config::config_to_json(&ctx.config));
            Ok(())
        }
    }
}

/// Stdin lines on a channel, read on a blocking thread. The channel closes
/// at EOF.
pub(crate) fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Local wall-clock time for display.
pub(crate) fn now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
