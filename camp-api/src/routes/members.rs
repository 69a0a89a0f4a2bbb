/// Project membership endpoints
///
/// # Endpoints
///
/// - `GET    /api/v1/projects/:project_id/role` - The caller's own role
/// - `GET    /api/v1/projects/:project_id/members` - Any member
/// - `POST   /api/v1/projects/:project_id/members` - Admin; re-inviting overwrites the role
/// - `PUT    /api/v1/projects/:project_id/members/:user_id` - Admin
/// - `DELETE /api/v1/projects/:project_id/members/:user_id` - Admin
///
/// Role changes take effect on the member's next request; nothing caches
/// a role between requests.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use camp_shared::{
    auth::{
        authorization::{Operation, ResourceScope},
        guard::Identity,
        lifecycle::normalize_identifier,
    },
    models::membership::{ProjectMember, ProjectMemberDetail, ProjectRole},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// One of `admin`, `project_admin`, `member`
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub project_id: Uuid,
    pub role: ProjectRole,
}

fn parse_role(raw: &str) -> ApiResult<ProjectRole> {
    raw.parse::<ProjectRole>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid User id: {}", raw)))
}

/// The caller's role in a project
pub async fn get_own_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::GetOwnRole.policy(),
        )
        .await?;

    Ok(Json(RoleResponse {
        project_id: ctx.project_id,
        role: ctx.role,
    }))
}

/// List members with their public profiles, oldest membership first
pub async fn list_members(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<ProjectMemberDetail>>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::ListMembers.policy(),
        )
        .await?;

    let members = state.stores.members.list_members(ctx.project_id).await?;
    Ok(Json(members))
}

/// Add a user to the project by email
///
/// # Errors
///
/// - `404 Not Found`: No user with this email
/// - `400 Bad Request`: Unknown role
pub async fn add_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<ProjectMember>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::AddMember.policy(),
        )
        .await?;

    req.validate()?;
    let role = parse_role(&req.role)?;

    let user = state
        .stores
        .users
        .find_user_by_email(&normalize_identifier(&req.email))
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

    let member = state
        .stores
        .members
        .upsert_member(ctx.project_id, user.id, role)
        .await?;

    info!(
        project_id = %ctx.project_id,
        member_id = %user.id,
        role = %role,
        "Project member added"
    );

    Ok(Json(member))
}

/// Change a member's role
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, user_id)): Path<(String, String)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<ProjectMember>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::UpdateMemberRole.policy(),
        )
        .await?;

    let user_id = parse_user_id(&user_id)?;
    let role = parse_role(&req.role)?;

    let member = state
        .stores
        .members
        .update_member_role(ctx.project_id, user_id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project member not found".to_string()))?;

    info!(project_id = %ctx.project_id, member_id = %user_id, role = %role, "Member role updated");
    Ok(Json(member))
}

/// Remove a member; their access ends with the next request
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((project_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let ctx = state
        .authorizer
        .authorize(
            &identity,
            &ResourceScope::project(&project_id)?,
            &Operation::RemoveMember.policy(),
        )
        .await?;

    let user_id = parse_user_id(&user_id)?;

    if !state
        .stores
        .members
        .remove_member(ctx.project_id, user_id)
        .await?
    {
        return Err(ApiError::NotFound("Project member not found".to_string()));
    }

    info!(project_id = %ctx.project_id, member_id = %user_id, "Project member removed");
    Ok(MessageResponse::new("Project member removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("project_admin").unwrap(), ProjectRole::ProjectAdmin);
        assert!(matches!(parse_role("owner"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_user_id("42"), Err(ApiError::BadRequest(_))));
    }
}
