use std::sync::Arc;

use workboard_api::{MutationError, StoreEvent, Task, TaskBoard, TaskStatus};
use workboard_common::{EntityId, WorkboardError};

use crate::cli::TaskAction;
use crate::context::Context;

pub async fn run(ctx: &Context, action: TaskAction) -> Result<(), WorkboardError> {
    match action {
        TaskAction::List { project } => {
            let board = load(ctx, &project).await?;
            print_board(&board.tasks());
            Ok(())
        }
        TaskAction::Move {
            project,
            task,
            status,
        } => move_task(ctx, &project, &task, status).await,
    }
}

async fn load(ctx: &Context, project: &str) -> Result<TaskBoard, WorkboardError> {
    let board = TaskBoard::new(Arc::clone(&ctx.api), EntityId::new(project), ctx.events.clone());
    board.refresh().await?;
    Ok(board)
}

async fn move_task(
    ctx: &Context,
    project: &str,
    task: &str,
    status: TaskStatus,
) -> Result<(), WorkboardError> {
    let board = load(ctx, project).await?;
    let mut changes = board.subscribe();
    let result = board.move_task(&EntityId::new(task), status).await;

    while let Ok(change) = changes.try_recv() {
        match change {
            StoreEvent::Applied { id, value } => {
                println!("{id}: moved to {} (pending)", value.status.as_str())
            }
            StoreEvent::Confirmed { id, value } => {
                println!("{id}: {} confirmed", value.status.as_str())
            }
            StoreEvent::Reverted { id, value, error } => {
                println!("{id}: back to {} ({})", value.status.as_str(), error.user_message())
            }
            StoreEvent::Reloaded => {}
        }
    }

    match result {
        Ok(_) => Ok(()),
        Err(MutationError::UnknownEntity(id)) => Err(WorkboardError::Other(format!(
            "task {id} is not on project {project}'s board"
        ))),
        Err(MutationError::Commit(e)) => Err(e.into()),
    }
}

fn print_board(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done] {
        let column: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        println!("{} ({})", status.as_str(), column.len());
        for task in column {
            let assignees: Vec<&str> = task.assignees.iter().map(|u| u.name.as_str()).collect();
            let due = task.due_date.as_deref().unwrap_or("-");
            println!("  {:<8} {:<40} due {due:<12} {}", task.id.as_str(), task.title, assignees.join(", "));
        }
    }
}
