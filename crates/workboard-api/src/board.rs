//! A project's task board with optimistic status moves.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};
use workboard_common::{ApiError, EntityId, EventBus, UiEvent};

use crate::endpoints::WorkboardApi;
use crate::optimistic::{MutationError, OptimisticStore, StoreEvent};
use crate::types::{Task, TaskStatus};

pub struct TaskBoard {
    api: Arc<WorkboardApi>,
    project: EntityId,
    store: OptimisticStore<EntityId, Task>,
    events: EventBus,
}

impl TaskBoard {
    pub fn new(api: Arc<WorkboardApi>, project: EntityId, events: EventBus) -> Self {
        Self {
            api,
            project,
            store: OptimisticStore::new(),
            events,
        }
    }

    pub fn project(&self) -> &EntityId {
        &self.project
    }

    /// Reload every task from the backend.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let tasks = self.api.tasks(&self.project).await?;
        let count = tasks.len();
        self.store
            .replace_all(tasks.into_iter().map(|t| (t.id.clone(), t)));
        info!(project = %self.project, count, "task board loaded");
        Ok(count)
    }

    /// Tasks as currently shown, ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.store.snapshot().into_iter().map(|(_, t)| t).collect();
        tasks.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        tasks
    }

    pub fn task(&self, id: &EntityId) -> Option<Task> {
        self.store.get(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent<EntityId, Task>> {
        self.store.subscribe()
    }

    /// Move a task to `status`. The board shows the new column at once; if
    /// the backend refuses, the task goes back and the failure is published.
    pub async fn move_task(&self, task: &EntityId, status: TaskStatus) -> Result<Task, MutationError> {
        let api = Arc::clone(&self.api);
        let project = self.project.clone();
        let task_id = task.clone();
        let pending = self.store.apply(
            task.clone(),
            move |t: &Task| Task {
                status,
                ..t.clone()
            },
            move |_proposed| async move {
                api.update_task_status(&project, &task_id, status).await?;
                Ok(None)
            },
        );

        match pending.await {
            Ok(task) => Ok(task),
            Err(MutationError::Commit(error)) => {
                warn!(task = %task, status = status.as_str(), error = %error, "task move rejected");
                self.events.publish(UiEvent::MutationFailed {
                    entity_id: task.to_string(),
                    message: error.user_message(),
                });
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "refresh after rejected move failed");
                }
                Err(MutationError::Commit(error))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthTokenStore;
    use crate::test_support::{client_for, serve};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, patch};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn task_list() -> Value {
        json!([
            {"taskId": 1, "title": "Draft outline", "status": "TODO"},
            {"taskId": 2, "title": "Build", "status": "IN_PROGRESS"}
        ])
    }

    async fn board(router: Router) -> (TaskBoard, EventBus) {
        let origin = serve(router).await;
        let client = client_for(&origin, Arc::new(AuthTokenStore::in_memory()));
        let api = Arc::new(WorkboardApi::new(Arc::new(client)));
        let events = EventBus::default();
        (TaskBoard::new(api, EntityId::from(7), events.clone()), events)
    }

    #[tokio::test]
    async fn refresh_loads_tasks() {
        let router = Router::new().route(
            "/api/projects/{project}/tasks",
            get(|| async { Json(task_list()) }),
        );
        let (board, _) = board(router).await;
        assert_eq!(board.refresh().await.unwrap(), 2);
        let tasks = board.tasks();
        assert_eq!(tasks[0].title, "Draft outline");
        assert_eq!(tasks[1].status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn accepted_move_is_confirmed() {
        let router = Router::new()
            .route("/api/projects/{project}/tasks", get(|| async { Json(task_list()) }))
            .route(
                "/api/projects/{project}/tasks/{task}/status",
                patch(|Path((_, _)): Path<(String, String)>| async { Json(json!({"success": true})) }),
            );
        let (board, _) = board(router).await;
        board.refresh().await.unwrap();

        let moved = board
            .move_task(&EntityId::from(1), TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(moved.status, TaskStatus::Done);
        assert_eq!(board.task(&EntityId::from(1)).unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn rejected_move_rolls_back_and_notifies() {
        let router = Router::new()
            .route("/api/projects/{project}/tasks", get(|| async { Json(task_list()) }))
            .route(
                "/api/projects/{project}/tasks/{task}/status",
                patch(|| async { (StatusCode::CONFLICT, "task is locked") }),
            );
        let (board, events) = board(router).await;
        let mut rx = events.subscribe();
        board.refresh().await.unwrap();

        let err = board
            .move_task(&EntityId::from(2), TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Commit(ApiError::RemoteRejected { status: 409, .. })));
        assert_eq!(
            board.task(&EntityId::from(2)).unwrap().status,
            TaskStatus::InProgress
        );
        match rx.recv().await.unwrap() {
            UiEvent::MutationFailed { entity_id, message } => {
                assert_eq!(entity_id, "2");
                assert_eq!(message, "task is locked");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn moving_unknown_task_fails_without_request() {
        let router = Router::new().route("/api/projects/{project}/tasks", get(|| async { Json(json!([])) }));
        let (board, _) = board(router).await;
        board.refresh().await.unwrap();
        let err = board
            .move_task(&EntityId::from(99), TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::UnknownEntity(_)));
    }
}
