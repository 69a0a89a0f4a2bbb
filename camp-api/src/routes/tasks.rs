/// Task and subtask endpoints
///
/// Tasks and subtasks carry no access rules of their own. A task id is
/// resolved to its project, a subtask id to its task and then the project,
/// and the caller's role in that project decides.
///
/// # Endpoints
///
/// - `GET    /api/v1/projects/:project_id/tasks` - Any member
/// - `POST   /api/v1/projects/:project_id/tasks` - Admin, ProjectAdmin
/// - `GET    /api/v1/tasks/:task_id` - Any member; includes subtasks
/// - `PUT    /api/v1/tasks/:task_id` - Admin, ProjectAdmin
/// - `PATCH  /api/v1/tasks/:task_id/status` - Any member
/// - `DELETE /api/v1/tasks/:task_id` - Admin, ProjectAdmin
/// - `GET    /api/v1/tasks/:task_id/subtasks` - Any member
/// - `POST   /api/v1/tasks/:task_id/subtasks` - Admin, ProjectAdmin
/// - `PUT    /api/v1/subtasks/:subtask_id` - Any member may toggle completion;
///   renaming needs Admin or ProjectAdmin
/// - `DELETE /api/v1/subtasks/:subtask_id` - Admin, ProjectAdmin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{nullable, trim_field, trim_optional, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use camp_shared::{
    auth::{
        authorization::{Operation, ResourceScope},
        guard::Identity,
    },
    models::{
        subtask::{CreateSubtask, Subtask, UpdateSubtask},
        task::{CreateTask, Task, TaskStatus, UpdateTask},
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    pub description: Option<String>,

    /// Must be a member of the project
    pub assigned_to: Option<Uuid>,

    #[serde(default)]
    pub status: TaskStatus,
}

impl CreateTaskRequest {
    fn normalize(&mut self) {
        trim_field(&mut self.title);
    }
}

/// Absent fields are left alone; `null` clears `description` or
/// `assigned_to`
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,

    pub status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    fn normalize(&mut self) {
        trim_optional(&mut self.title);
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubtaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
}

impl CreateSubtaskRequest {
    fn normalize(&mut self) {
        trim_field(&mut self.title);
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubtaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    pub is_completed: Option<bool>,
}

impl UpdateSubtaskRequest {
    fn normalize(&mut self) {
        trim_optional(&mut self.title);
    }
}

/// A task with its subtasks
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

fn subtask_not_found() -> ApiError {
    ApiError::NotFound("Subtask not found".to_string())
}

/// Rejects assignees who are not members of the project
async fn ensure_assignable(
    state: &AppState,
    project_id: Uuid,
    assignee: Option<Uuid>,
) -> ApiResult<()> {
    let Some(user_id) = assignee else {
        return Ok(());
    };

    match state.stores.members.find_member(project_id, user_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest(
            "Assignee is not a member of this project".to_string(),
        )),
    }
}

/// List a project's tasks, newest first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<Task>>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::ListTasks.policy(),
        )
        .await?;

    Ok(Json(state.stores.tasks.list_tasks(ctx.project_id).await?))
}

/// Create a task
pub async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(mut req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::CreateTask.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;
    ensure_assignable(&state, ctx.project_id, req.assigned_to).await?;

    let task = state
        .stores
        .tasks
        .create_task(CreateTask {
            project_id: ctx.project_id,
            title: req.title,
            description: req.description,
            assigned_to: req.assigned_to,
            assigned_by: identity.id,
            status: req.status,
        })
        .await?;

    info!(task_id = %task.id, project_id = %ctx.project_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// Get a task and its subtasks
pub async fn get_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskDetail>> {
    let task_id = parse_task(&task_id)?;
    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::GetTask.policy(),
        )
        .await?;

    let task = state
        .stores
        .tasks
        .find_task(task_id)
        .await?
        .ok_or_else(task_not_found)?;
    let subtasks = state.stores.tasks.list_subtasks(task_id).await?;

    Ok(Json(TaskDetail { task, subtasks }))
}

/// Update a task's fields
pub async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
    Json(mut req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task(&task_id)?;
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::UpdateTask.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;
    ensure_assignable(&state, ctx.project_id, req.assigned_to.flatten()).await?;

    let task = state
        .stores
        .tasks
        .update_task(
            task_id,
            UpdateTask {
                title: req.title,
                description: req.description,
                assigned_to: req.assigned_to,
                status: req.status,
            },
        )
        .await?
        .ok_or_else(task_not_found)?;

    Ok(Json(task))
}

/// Move a task to another column
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task(&task_id)?;
    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::UpdateTaskStatus.policy(),
        )
        .await?;

    let task = state
        .stores
        .tasks
        .update_task(
            task_id,
            UpdateTask {
                status: Some(req.status),
                ..UpdateTask::default()
            },
        )
        .await?
        .ok_or_else(task_not_found)?;

    Ok(Json(task))
}

/// Delete a task and its subtasks
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let task_id = parse_task(&task_id)?;
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::DeleteTask.policy(),
        )
        .await?;

    if !state.stores.tasks.delete_task(task_id).await? {
        return Err(task_not_found());
    }

    info!(%task_id, project_id = %ctx.project_id, user_id = %identity.id, "Task deleted");
    Ok(MessageResponse::new("Task deleted"))
}

/// List a task's subtasks, oldest first
pub async fn list_subtasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Vec<Subtask>>> {
    let task_id = parse_task(&task_id)?;
    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::ListSubtasks.policy(),
        )
        .await?;

    Ok(Json(state.stores.tasks.list_subtasks(task_id).await?))
}

/// Add a subtask to a task
pub async fn create_subtask(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
    Json(mut req): Json<CreateSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<Subtask>)> {
    let task_id = parse_task(&task_id)?;
    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Task(task_id),
            &Operation::CreateSubtask.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;

    let subtask = state
        .stores
        .tasks
        .create_subtask(CreateSubtask {
            task_id,
            title: req.title,
            created_by: identity.id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(subtask)))
}

/// Update a subtask
///
/// Toggling `is_completed` is open to every member; a request that changes
/// the title is held to the stricter rename rule.
pub async fn update_subtask(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(subtask_id): Path<String>,
    Json(mut req): Json<UpdateSubtaskRequest>,
) -> ApiResult<Json<Subtask>> {
    let subtask_id = parse_subtask(&subtask_id)?;
    let operation = if req.title.is_some() {
        Operation::RenameSubtask
    } else {
        Operation::UpdateSubtask
    };

    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Subtask(subtask_id),
            &operation.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;

    let subtask = state
        .stores
        .tasks
        .update_subtask(
            subtask_id,
            UpdateSubtask {
                title: req.title,
                is_completed: req.is_completed,
            },
        )
        .await?
        .ok_or_else(subtask_not_found)?;

    Ok(Json(subtask))
}

/// Delete a subtask
pub async fn delete_subtask(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(subtask_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let subtask_id = parse_subtask(&subtask_id)?;
    state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::Subtask(subtask_id),
            &Operation::DeleteSubtask.policy(),
        )
        .await?;

    if !state.stores.tasks.delete_subtask(subtask_id).await? {
        return Err(subtask_not_found());
    }

    Ok(MessageResponse::new("Subtask deleted"))
}

fn parse_task(raw: &str) -> ApiResult<Uuid> {
    Ok(ResourceScope::task(raw)?.id())
}

fn parse_subtask(raw: &str) -> ApiResult<Uuid> {
    Ok(ResourceScope::subtask(raw)?.id())
}
