/// Project note endpoints
///
/// - `GET    /api/v1/projects/:project_id/notes` - Any member
/// - `POST   /api/v1/projects/:project_id/notes` - Any member
/// - `GET    /api/v1/projects/:project_id/notes/:note_id` - Any member
/// - `PUT    /api/v1/projects/:project_id/notes/:note_id` - Admin
/// - `DELETE /api/v1/projects/:project_id/notes/:note_id` - Admin
///
/// A note id that exists under another project is reported as not found.

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
        authorization::{AuthzContext, Operation, ResourceScope},
        guard::Identity,
    },
    models::note::{CreateNote, ProjectNote},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(min = 1, max = 10000, message = "Content must be 1 to 10000 characters"))]
    pub content: String,
}

impl NoteRequest {
    fn normalize(&mut self) {
        trim_field(&mut self.content);
    }
}

fn note_not_found() -> ApiError {
    ApiError::NotFound("Note not found".to_string())
}

async fn authorize(
    state: &AppState,
    identity: &Identity,
    project_id: &str,
    operation: Operation,
) -> ApiResult<AuthzContext> {
    Ok(state
        .authorizer
        .authorize(
            identity,
            &ResourceScope::project(project_id)?,
            &operation.policy(),
        )
        .await?)
}

/// Loads a note, requiring it to belong to the project
async fn load_note(state: &AppState, project_id: Uuid, raw_note_id: &str) -> ApiResult<ProjectNote> {
    let note_id = Uuid::parse_str(raw_note_id.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid Note id: {}", raw_note_id)))?;

    state
        .stores
        .notes
        .find_note(note_id)
        .await?
        .filter(|note| note.project_id == project_id)
        .ok_or_else(note_not_found)
}

/// List a project's notes, newest first
pub async fn list_notes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<ProjectNote>>> {
    let ctx = authorize(&state, &identity, &project_id, Operation::ListNotes).await?;
    Ok(Json(state.stores.notes.list_notes(ctx.project_id).await?))
}

/// Add a note
pub async fn create_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(mut req): Json<NoteRequest>,
) -> ApiResult<(StatusCode, Json<ProjectNote>)> {
    let ctx = authorize(&state, &identity, &project_id, Operation::CreateNote).await?;
    req.normalize();
    req.validate()?;

    let note = state
        .stores
        .notes
        .create_note(CreateNote {
            project_id: ctx.project_id,
            created_by: identity.id,
            content: req.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, note_id)): Path<(String, String)>,
) -> ApiResult<Json<ProjectNote>> {
    let ctx = authorize(&state, &identity, &project_id, Operation::ViewNote).await?;
    Ok(Json(load_note(&state, ctx.project_id, &note_id).await?))
}

/// Replace a note's content
pub async fn update_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, note_id)): Path<(String, String)>,
    Json(mut req): Json<NoteRequest>,
) -> ApiResult<Json<ProjectNote>> {
    let ctx = authorize(&state, &identity, &project_id, Operation::UpdateNote).await?;
    req.normalize();
    req.validate()?;

    let note = load_note(&state, ctx.project_id, &note_id).await?;
    let note = state
        .stores
        .notes
        .update_note(note.id, &req.content)
        .await?
        .ok_or_else(note_not_found)?;

    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, note_id)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let ctx = authorize(&state, &identity, &project_id, Operation::DeleteNote).await?;

    let note = load_note(&state, ctx.project_id, &note_id).await?;
    if !state.stores.notes.delete_note(note.id).await? {
        return Err(note_not_found());
    }

    Ok(MessageResponse::new("Note deleted"))
}
