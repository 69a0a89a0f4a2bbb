/// Project endpoints
///
/// # Endpoints
///
/// - `GET    /api/v1/projects` - Projects the caller belongs to, with stats
/// - `POST   /api/v1/projects` - Create a project; the caller becomes Admin
/// - `GET    /api/v1/projects/:project_id` - Any member
/// - `PUT    /api/v1/projects/:project_id` - Admin only
/// - `DELETE /api/v1/projects/:project_id` - Admin only, cascades

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{trim_field, trim_optional, MessageResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use camp_shared::{
    auth::{
        authorization::{Operation, ResourceScope},
        guard::Identity,
    },
    models::{
        membership::ProjectRole,
        project::{CreateProject, Project, ProjectSummary, UpdateProject},
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsQuery {
    /// Case-insensitive substring of the project name
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
}

impl CreateProjectRequest {
    fn normalize(&mut self) {
        trim_field(&mut self.name);
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
}

impl UpdateProjectRequest {
    fn normalize(&mut self) {
        trim_optional(&mut self.name);
    }
}

/// A project as seen by one of its members
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
}

/// List the caller's projects, newest first
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    let projects = state
        .stores
        .projects
        .list_projects_for_user(identity.id, query.search.as_deref())
        .await?;

    Ok(Json(projects))
}

/// Create a project
pub async fn create_project(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(mut req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    req.normalize();
    req.validate()?;

    let project = state
        .stores
        .projects
        .create_project(CreateProject {
            name: req.name,
            description: req.description,
            created_by: identity.id,
        })
        .await?;

    info!(project_id = %project.id, user_id = %identity.id, "Project created");

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            project,
            role: ProjectRole::Admin,
        }),
    ))
}

/// Get a project
pub async fn get_project(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ProjectResponse>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::ViewProject.policy(),
        )
        .await?;

    let project = state
        .stores
        .projects
        .find_project(ctx.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(Json(ProjectResponse {
        project,
        role: ctx.role,
    }))
}

/// Update a project's name or description
pub async fn update_project(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(mut req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::UpdateProject.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;

    let project = state
        .stores
        .projects
        .update_project(
            ctx.project_id,
            UpdateProject {
                name: req.name,
                description: req.description,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(Json(ProjectResponse {
        project,
        role: ctx.role,
    }))
}

/// Delete a project with its members, tasks, notes and files
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::DeleteProject.policy(),
        )
        .await?;

    if !state.stores.projects.delete_project(ctx.project_id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    info!(project_id = %ctx.project_id, user_id = %identity.id, "Project deleted");
    Ok(MessageResponse::new("Project deleted"))
}
