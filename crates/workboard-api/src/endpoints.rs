//! Typed facade over every backend route the client consumes.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use workboard_common::{ApiError, EntityId};

use crate::client::{ApiRequest, RequestClient};
use crate::types::{Alarm, Task, TaskStatus, UserSummary};

pub struct WorkboardApi {
    client: Arc<RequestClient>,
}

impl WorkboardApi {
    pub fn new(client: Arc<RequestClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<RequestClient> {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub async fn user_info(&self) -> Result<Value, ApiError> {
        self.client.send(ApiRequest::get("/api/user/info")).await
    }

    pub async fn user_full_info(&self) -> Result<Value, ApiError> {
        self.client.send(ApiRequest::get("/api/user/fullInfo")).await
    }

    pub async fn search_users(&self, keyword: &str) -> Result<Vec<UserSummary>, ApiError> {
        self.list(ApiRequest::get("/api/user/search").query("keyword", keyword))
            .await
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub async fn tasks(&self, project: &EntityId) -> Result<Vec<Task>, ApiError> {
        self.list(ApiRequest::get(format!("/api/projects/{project}/tasks")))
            .await
    }

    /// Change a task's status. Unlike reads, a rejected write is an error
    /// even when the backend answers with a JSON body.
    pub async fn update_task_status(
        &self,
        project: &EntityId,
        task: &EntityId,
        status: TaskStatus,
    ) -> Result<Value, ApiError> {
        self.client
            .execute(
                ApiRequest::patch(format!("/api/projects/{project}/tasks/{task}/status"))
                    .json(serde_json::json!({ "status": status })),
            )
            .await?
            .accepted()
    }

    pub async fn issues(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.project_resource(project, "issues").await
    }

    pub async fn members(&self, project: &EntityId) -> Result<Vec<UserSummary>, ApiError> {
        self.list(ApiRequest::get(format!("/api/projects/{project}/members")))
            .await
    }

    pub async fn final_reports(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.project_resource(project, "final-reports").await
    }

    pub async fn sidebar(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.project_resource(project, "sidebar").await
    }

    pub async fn dashboard(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.project_resource(project, "dashboard").await
    }

    /// Dashboard data for display. Read failures degrade to an empty
    /// object so the page renders placeholders instead of blocking.
    pub async fn dashboard_or_placeholder(&self, project: &EntityId) -> Value {
        degrade(self.dashboard(project).await, "dashboard")
    }

    async fn project_resource(&self, project: &EntityId, resource: &str) -> Result<Value, ApiError> {
        self.client
            .send(ApiRequest::get(format!("/api/projects/{project}/{resource}")))
            .await
    }

    // -----------------------------------------------------------------------
    // GitHub
    // -----------------------------------------------------------------------

    pub async fn branches(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.github(project, "getBranch", None).await
    }

    pub async fn commits(&self, project: &EntityId, branch: Option<&str>) -> Result<Value, ApiError> {
        self.github(project, "commits", branch).await
    }

    pub async fn recent_commits(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.github(project, "recent-commits", None).await
    }

    pub async fn today_commit_count(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.github(project, "today-commit-count", None).await
    }

    pub async fn contribution(&self, project: &EntityId) -> Result<Value, ApiError> {
        self.github(project, "contribution", None).await
    }

    async fn github(
        &self,
        project: &EntityId,
        resource: &str,
        branch: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut request = ApiRequest::get(format!("/api/github/{project}/{resource}"));
        if let Some(branch) = branch {
            request = request.query("branch", branch);
        }
        self.client.send(request).await
    }

    // -----------------------------------------------------------------------
    // Alarms
    // -----------------------------------------------------------------------

    pub async fn alarms(&self) -> Result<Vec<Alarm>, ApiError> {
        self.list(ApiRequest::get("/api/alarms")).await
    }

    pub async fn unread_alarms(&self) -> Result<Vec<Alarm>, ApiError> {
        self.list(ApiRequest::get("/api/alarms/unread")).await
    }

    pub async fn mark_alarm_read(&self, alarm: &EntityId) -> Result<Value, ApiError> {
        self.client
            .execute(ApiRequest::put(format!("/api/alarms/{alarm}/read")))
            .await?
            .accepted()
    }

    pub async fn mark_all_alarms_read(&self) -> Result<Value, ApiError> {
        self.client
            .execute(ApiRequest::put("/api/alarms/read-all"))
            .await?
            .accepted()
    }

    pub async fn delete_read_alarms(&self) -> Result<Value, ApiError> {
        self.client.send(ApiRequest::delete("/api/alarms/read")).await
    }

    pub async fn delete_all_alarms(&self) -> Result<Value, ApiError> {
        self.client.send(ApiRequest::delete("/api/alarms/all")).await
    }

    /// A typed list read. A rejected status is an error here; it never
    /// decodes as an empty list.
    async fn list<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>, ApiError> {
        let body = self.client.execute(request).await?.accepted()?;
        list_from(body)
    }
}

/// List endpoints answer either with a bare array or with the array wrapped
/// in a `data` field.
fn list_from<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
    let items = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
        Value::Object(map) if map.is_empty() => Value::Array(Vec::new()),
        other => other,
    };
    serde_json::from_value(items).map_err(|e| ApiError::Parse(e.to_string()))
}

fn degrade(result: Result<Value, ApiError>, what: &str) -> Value {
    result.unwrap_or_else(|e| {
        warn!(resource = what, error = %e, "read failed; showing placeholder");
        Value::Object(serde_json::Map::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthTokenStore;
    use crate::test_support::{client_for, serve};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, patch, put};
    use axum::{Json, Router};
    use serde_json::json;
    use workboard_common::ErrorKind;

    async fn api(router: Router) -> WorkboardApi {
        let origin = serve(router).await;
        WorkboardApi::new(Arc::new(client_for(&origin, Arc::new(AuthTokenStore::in_memory()))))
    }

    #[test]
    fn list_from_accepts_bare_and_wrapped_arrays() {
        let bare: Vec<u32> = list_from(json!([1, 2])).unwrap();
        let wrapped: Vec<u32> = list_from(json!({"data": [3]})).unwrap();
        let empty: Vec<u32> = list_from(json!({})).unwrap();
        assert_eq!(bare, vec![1, 2]);
        assert_eq!(wrapped, vec![3]);
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn search_users_sends_keyword() {
        let router = Router::new().route(
            "/api/user/search",
            get(|q: axum::extract::Query<std::collections::HashMap<String, String>>| async move {
                Json(json!([{ "userId": q.0["keyword"].clone(), "name": "Kim" }]))
            }),
        );
        let users = api(router).await.search_users("kim").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id.as_str(), "kim");
    }

    #[tokio::test]
    async fn update_task_status_patches_status_body() {
        let router = Router::new().route(
            "/api/projects/{project}/tasks/{task}/status",
            patch(|Path((p, t)): Path<(String, String)>, Json(body): Json<Value>| async move {
                Json(json!({ "project": p, "task": t, "status": body["status"] }))
            }),
        );
        let value = api(router)
            .await
            .update_task_status(&EntityId::from(1), &EntityId::from(9), TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(value, json!({"project": "1", "task": "9", "status": "DONE"}));
    }

    #[tokio::test]
    async fn mark_alarm_read_uses_put() {
        let router = Router::new().route(
            "/api/alarms/{id}/read",
            put(|Path(id): Path<String>| async move { Json(json!({ "read": id })) }),
        );
        let value = api(router).await.mark_alarm_read(&EntityId::from("a7")).await.unwrap();
        assert_eq!(value["read"], "a7");
    }

    #[tokio::test]
    async fn commits_passes_branch_query() {
        let router = Router::new().route(
            "/api/github/{project}/commits",
            get(|q: axum::extract::Query<std::collections::HashMap<String, String>>| async move {
                Json(json!({ "branch": q.0.get("branch") }))
            }),
        );
        let value = api(router)
            .await
            .commits(&EntityId::from(3), Some("main"))
            .await
            .unwrap();
        assert_eq!(value["branch"], "main");
    }

    #[tokio::test]
    async fn dashboard_failure_degrades_to_placeholder() {
        let router = Router::new().route(
            "/api/projects/{project}/dashboard",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let value = api(router)
            .await
            .dashboard_or_placeholder(&EntityId::from(1))
            .await;
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn expired_token_fails_user_search() {
        let router = Router::new().route(
            "/api/user/search",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"message": "expired token"}))) }),
        );
        let err = api(router).await.search_users("al").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert_eq!(err.user_message(), "expired token");
    }

    #[tokio::test]
    async fn forbidden_task_list_is_not_an_empty_board() {
        let router = Router::new().route(
            "/api/projects/{project}/tasks",
            get(|| async { (StatusCode::FORBIDDEN, Json(json!({}))) }),
        );
        let err = api(router).await.tasks(&EntityId::from(4)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::RemoteRejected {
                status: 403,
                message: "{}".into(),
            }
        );
    }

    #[tokio::test]
    async fn rejected_status_update_is_an_error() {
        let router = Router::new().route(
            "/api/projects/{project}/tasks/{task}/status",
            patch(|| async { (StatusCode::FORBIDDEN, Json(json!({"message": "not a member"}))) }),
        );
        let err = api(router)
            .await
            .update_task_status(&EntityId::from(1), &EntityId::from(2), TaskStatus::Todo)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "not a member");
    }
}
