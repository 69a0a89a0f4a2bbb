/// Project file endpoints
///
/// Only file metadata is handled here. The bytes live wherever `url`
/// points; storing and serving them is up to the client's upload target.
///
/// - `GET    /api/v1/projects/:project_id/files` - Any member
/// - `POST   /api/v1/projects/:project_id/files` - Any member
/// - `DELETE /api/v1/projects/:project_id/files/:file_id` - The uploader,
///   or an Admin or ProjectAdmin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{trim_field, MessageResponse},
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
    models::project_file::{CreateProjectFile, ProjectFile},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UploadFileRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(url(message = "Invalid file URL"))]
    pub url: String,

    #[validate(length(max = 255, message = "Content type must be at most 255 characters"))]
    pub content_type: Option<String>,

    #[validate(range(min = 0, message = "Size cannot be negative"))]
    pub size_bytes: Option<i64>,
}

impl UploadFileRequest {
    fn normalize(&mut self) {
        trim_field(&mut self.name);
        trim_field(&mut self.url);
    }
}

fn file_not_found() -> ApiError {
    ApiError::NotFound("File not found".to_string())
}

/// List a project's files, newest first
pub async fn list_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<ProjectFile>>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::ListFiles.policy(),
        )
        .await?;

    Ok(Json(state.stores.files.list_files(ctx.project_id).await?))
}

/// Register an uploaded file
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(mut req): Json<UploadFileRequest>,
) -> ApiResult<(StatusCode, Json<ProjectFile>)> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::UploadFile.policy(),
        )
        .await?;

    req.normalize();
    req.validate()?;

    let file = state
        .stores
        .files
        .create_file(CreateProjectFile {
            project_id: ctx.project_id,
            uploaded_by: identity.id,
            name: req.name,
            url: req.url,
            content_type: req.content_type,
            size_bytes: req.size_bytes,
        })
        .await?;

    info!(file_id = %file.id, project_id = %ctx.project_id, "File registered");
    Ok((StatusCode::CREATED, Json(file)))
}

/// Delete a file record
///
/// Membership is checked before the file is looked up, so non-members learn
/// nothing about which file ids exist.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, file_id)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let scope = ResourceScope::project(&project_id)?;
    let membership = state.authorizer.membership(&identity, &scope).await?;

    let file_id = Uuid::parse_str(file_id.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid File id: {}", file_id)))?;

    let file = state
        .stores
        .files
        .find_file(file_id)
        .await?
        .filter(|f| f.project_id == membership.project_id)
        .ok_or_else(file_not_found)?;

    let ctx = Operation::DeleteFile
        .policy()
        .or_owned_by(file.uploaded_by)
        .evaluate(identity.id, membership)?;

    if !state.stores.files.delete_file(file.id).await? {
        return Err(file_not_found());
    }

    info!(
        file_id = %file.id,
        project_id = %ctx.project_id,
        granted_by = ?ctx.granted_by,
        "File deleted"
    );
    Ok(MessageResponse::new("File deleted"))
}
