use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use workboard_api::TaskStatus;

/// workboard: terminal client for the workboard project backend.
#[derive(Parser, Debug)]
#[command(name = "workboard", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter override, e.g. `debug` or `workboard_realtime=trace`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Backend origin override.
    #[arg(long, global = true)]
    pub origin: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the credential.
    Login {
        user_id: String,
        /// Password; read from stdin when omitted.
        #[arg(long, env = "WORKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Discard the stored credential.
    Logout,
    /// Validate the session and show the signed-in user.
    Whoami,
    /// Find users by keyword.
    SearchUsers {
        keyword: Option<String>,
        /// User ids to leave out of the results.
        #[arg(long)]
        exclude: Vec<String>,
        /// Treat each stdin line as a keystroke burst.
        #[arg(short, long)]
        interactive: bool,
    },
    /// Alarm inbox.
    Alarms {
        #[command(subcommand)]
        action: AlarmAction,
    },
    /// Project task board.
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Join a conversation and send stdin lines to it.
    Chat(ChatArgs),
    /// Print the effective configuration as JSON.
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum AlarmAction {
    List {
        #[arg(long)]
        unread: bool,
    },
    /// Stream alarms as they arrive; type `read <id>` to acknowledge one.
    Watch,
    Read {
        id: String,
    },
    ReadAll,
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    List {
        #[arg(long)]
        project: String,
    },
    Move {
        #[arg(long)]
        project: String,
        task: String,
        /// todo, in-progress, or done.
        #[arg(value_parser = parse_status)]
        status: TaskStatus,
    },
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct ChatArgs {
    /// Issue conversation to join.
    #[arg(long)]
    pub issue: Option<String>,
    /// Task update stream to follow (receive-only).
    #[arg(long)]
    pub task: Option<String>,
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    s.parse()
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_move_parses_status() {
        let args = Args::try_parse_from([
            "workboard", "tasks", "move", "--project", "3", "17", "in-progress",
        ])
        .unwrap();
        match args.command {
            Command::Tasks {
                action: TaskAction::Move { project, task, status },
            } => {
                assert_eq!(project, "3");
                assert_eq!(task, "17");
                assert_eq!(status, TaskStatus::InProgress);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_status_is_rejected() {
        assert!(Args::try_parse_from(["workboard", "tasks", "move", "--project", "1", "2", "later"]).is_err());
    }

    #[test]
    fn chat_needs_exactly_one_topic() {
        assert!(Args::try_parse_from(["workboard", "chat"]).is_err());
        assert!(Args::try_parse_from(["workboard", "chat", "--issue", "1", "--task", "2"]).is_err());
        assert!(Args::try_parse_from(["workboard", "chat", "--issue", "1"]).is_ok());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from(["workboard", "whoami", "--origin", "http://x:1"]).unwrap();
        assert_eq!(args.origin.as_deref(), Some("http://x:1"));
    }
}
