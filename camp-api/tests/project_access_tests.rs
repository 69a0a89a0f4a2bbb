/// End-to-end tests of project, task, note and file access by role

mod common;

use axum::http::StatusCode;
use common::{TestContext, TestUser};
use serde_json::json;

/// A project owned by `admin` with `member` at the plain member role
struct Team {
    ctx: TestContext,
    admin: TestUser,
    member: TestUser,
    outsider: TestUser,
    project_id: String,
}

async fn team() -> Team {
    let ctx = TestContext::new();
    let admin = ctx.signed_in("alice").await;
    let member = ctx.signed_in("bob").await;
    let outsider = ctx.signed_in("carol").await;
    let project_id = ctx.create_project(&admin, "Launch").await;
    ctx.add_member(&admin, &project_id, &member, "member").await;

    Team {
        ctx,
        admin,
        member,
        outsider,
        project_id,
    }
}

#[tokio::test]
async fn test_project_listing_carries_role_and_stats() {
    let t = team().await;
    t.ctx.create_task(&t.admin, &t.project_id, "Write docs").await;

    let response = t
        .ctx
        .request("GET", "/api/v1/projects", Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let projects = response.body.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["role"], "member");
    assert_eq!(projects[0]["member_count"], 2);
    assert_eq!(projects[0]["stats"]["todo"], 1);
    assert_eq!(projects[0]["stats"]["total"], 1);

    let response = t
        .ctx
        .request("GET", "/api/v1/projects", Some(&t.outsider.bearer()), None)
        .await;
    assert_eq!(response.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_own_role_and_outsider_access() {
    let t = team().await;
    let uri = format!("/api/v1/projects/{}/role", t.project_id);

    let response = t.ctx.request("GET", &uri, Some(&t.admin.bearer()), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["role"], "admin");

    let response = t.ctx.request("GET", &uri, Some(&t.member.bearer()), None).await;
    assert_eq!(response.body["role"], "member");

    let response = t
        .ctx
        .request(
            "GET",
            &format!("/api/v1/projects/{}", t.project_id),
            Some(&t.outsider.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "forbidden");
}

#[tokio::test]
async fn test_malformed_and_unknown_ids() {
    let t = team().await;

    let response = t
        .ctx
        .request("GET", "/api/v1/projects/not-a-uuid", Some(&t.admin.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = t
        .ctx
        .request("GET", "/api/v1/tasks/42", Some(&t.admin.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = t
        .ctx
        .request(
            "GET",
            &format!("/api/v1/tasks/{}", uuid::Uuid::new_v4()),
            Some(&t.admin.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_management_is_admin_only() {
    let t = team().await;
    let members_uri = format!("/api/v1/projects/{}/members", t.project_id);

    let response = t
        .ctx
        .request(
            "POST",
            &members_uri,
            Some(&t.member.bearer()),
            Some(json!({ "email": t.outsider.email, "role": "member" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request(
            "POST",
            &members_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "email": "ghost@example.com", "role": "member" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = t
        .ctx
        .request(
            "POST",
            &members_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "email": t.outsider.email, "role": "owner" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = t
        .ctx
        .request("GET", &members_uri, Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_task_deletion_follows_role_changes() {
    let t = team().await;
    let task_id = t.ctx.create_task(&t.admin, &t.project_id, "Ship it").await;
    let task_uri = format!("/api/v1/tasks/{task_id}");

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/projects/{}/tasks", t.project_id),
            Some(&t.member.bearer()),
            Some(json!({ "title": "Sneaky" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request("DELETE", &task_uri, Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request(
            "PUT",
            &format!("/api/v1/projects/{}/members/{}", t.project_id, t.member.id),
            Some(&t.admin.bearer()),
            Some(json!({ "role": "project_admin" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = t
        .ctx
        .request("DELETE", &task_uri, Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = t
        .ctx
        .request("GET", &task_uri, Some(&t.admin.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_removed_member_loses_access() {
    let t = team().await;
    let task_id = t.ctx.create_task(&t.admin, &t.project_id, "Ship it").await;

    let response = t
        .ctx
        .request(
            "DELETE",
            &format!("/api/v1/projects/{}/members/{}", t.project_id, t.member.id),
            Some(&t.admin.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = t
        .ctx
        .request(
            "GET",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&t.member.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_moves_tasks_and_toggles_subtasks() {
    let t = team().await;
    let task_id = t.ctx.create_task(&t.admin, &t.project_id, "Ship it").await;

    let response = t
        .ctx
        .request(
            "PATCH",
            &format!("/api/v1/tasks/{task_id}/status"),
            Some(&t.member.bearer()),
            Some(json!({ "status": "in_progress" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "in_progress");

    let response = t
        .ctx
        .request(
            "PUT",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&t.member.bearer()),
            Some(json!({ "title": "Renamed" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/subtasks"),
            Some(&t.admin.bearer()),
            Some(json!({ "title": "Tag release" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let subtask_uri = format!(
        "/api/v1/subtasks/{}",
        response.body["id"].as_str().unwrap()
    );

    let response = t
        .ctx
        .request(
            "PUT",
            &subtask_uri,
            Some(&t.member.bearer()),
            Some(json!({ "is_completed": true })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["is_completed"], true);

    let response = t
        .ctx
        .request(
            "PUT",
            &subtask_uri,
            Some(&t.member.bearer()),
            Some(json!({ "title": "Other" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request("DELETE", &subtask_uri, Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request(
            "GET",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&t.member.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["subtasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_assignee_must_be_member() {
    let t = team().await;
    let uri = format!("/api/v1/projects/{}/tasks", t.project_id);

    let response = t
        .ctx
        .request(
            "POST",
            &uri,
            Some(&t.admin.bearer()),
            Some(json!({ "title": "Review", "assigned_to": t.outsider.id })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = t
        .ctx
        .request(
            "POST",
            &uri,
            Some(&t.admin.bearer()),
            Some(json!({ "title": "Review", "assigned_to": t.member.id })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["assigned_to"], t.member.id.as_str());
}

#[tokio::test]
async fn test_notes_are_edited_by_admins_only() {
    let t = team().await;

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/projects/{}/notes", t.project_id),
            Some(&t.member.bearer()),
            Some(json!({ "content": "Standup at 10" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let note_uri = format!(
        "/api/v1/projects/{}/notes/{}",
        t.project_id,
        response.body["id"].as_str().unwrap()
    );

    let response = t
        .ctx
        .request(
            "PUT",
            &note_uri,
            Some(&t.member.bearer()),
            Some(json!({ "content": "Standup at 11" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request(
            "PUT",
            &note_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "content": "Standup at 11" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["content"], "Standup at 11");

    // A note is only reachable through its own project
    let other = t.ctx.create_project(&t.admin, "Other").await;
    let response = t
        .ctx
        .request(
            "GET",
            &note_uri.replace(&t.project_id, &other),
            Some(&t.admin.bearer()),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_deletion_by_uploader_or_elevated_role() {
    let t = team().await;
    let extra = t.ctx.signed_in("dave").await;
    t.ctx.add_member(&t.admin, &t.project_id, &extra, "member").await;

    let files_uri = format!("/api/v1/projects/{}/files", t.project_id);
    let response = t
        .ctx
        .request(
            "POST",
            &files_uri,
            Some(&t.member.bearer()),
            Some(json!({
                "name": "plan.pdf",
                "url": "https://files.example.com/plan.pdf",
                "content_type": "application/pdf",
                "size_bytes": 1024,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let file_uri = format!("{}/{}", files_uri, response.body["id"].as_str().unwrap());

    let response = t
        .ctx
        .request("DELETE", &file_uri, Some(&extra.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request("DELETE", &file_uri, Some(&t.outsider.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t
        .ctx
        .request("DELETE", &file_uri, Some(&t.member.bearer()), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = t
        .ctx
        .request("GET", &files_uri, Some(&t.admin.bearer()), None)
        .await;
    assert_eq!(response.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_project_deletion_is_admin_only() {
    let t = team().await;
    let uri = format!("/api/v1/projects/{}", t.project_id);

    let response = t.ctx.request("DELETE", &uri, Some(&t.member.bearer()), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = t.ctx.request("DELETE", &uri, Some(&t.admin.bearer()), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = t.ctx.request("GET", &uri, Some(&t.admin.bearer()), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blank_names_are_rejected_and_names_trimmed() {
    let t = team().await;

    let response = t
        .ctx
        .request(
            "POST",
            "/api/v1/projects",
            Some(&t.admin.bearer()),
            Some(json!({ "name": "   " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = t
        .ctx
        .request(
            "POST",
            "/api/v1/projects",
            Some(&t.admin.bearer()),
            Some(json!({ "name": "  Roadmap  " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["name"], "Roadmap");

    let response = t
        .ctx
        .request(
            "PUT",
            &format!("/api/v1/projects/{}", t.project_id),
            Some(&t.admin.bearer()),
            Some(json!({ "name": "\t " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/projects/{}/tasks", t.project_id),
            Some(&t.admin.bearer()),
            Some(json!({ "title": "   " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let task_id = t.ctx.create_task(&t.admin, &t.project_id, "Ship it").await;
    let response = t
        .ctx
        .request(
            "PUT",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&t.admin.bearer()),
            Some(json!({ "title": "  " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/subtasks"),
            Some(&t.admin.bearer()),
            Some(json!({ "title": " " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/projects/{}/notes", t.project_id),
            Some(&t.admin.bearer()),
            Some(json!({ "content": "   " })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_task_assignee_and_description_can_be_cleared() {
    let t = team().await;

    let response = t
        .ctx
        .request(
            "POST",
            &format!("/api/v1/projects/{}/tasks", t.project_id),
            Some(&t.admin.bearer()),
            Some(json!({
                "title": "Review",
                "description": "Check the release notes",
                "assigned_to": t.member.id,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let task_uri = format!("/api/v1/tasks/{}", response.body["id"].as_str().unwrap());

    // Absent fields stay as they are
    let response = t
        .ctx
        .request(
            "PUT",
            &task_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "title": "Review again" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["assigned_to"], t.member.id.as_str());
    assert_eq!(response.body["description"], "Check the release notes");

    let response = t
        .ctx
        .request(
            "PUT",
            &task_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "assigned_to": null })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["assigned_to"].is_null());
    assert_eq!(response.body["description"], "Check the release notes");

    let response = t
        .ctx
        .request(
            "PUT",
            &task_uri,
            Some(&t.admin.bearer()),
            Some(json!({ "description": null })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["description"].is_null());
    assert_eq!(response.body["title"], "Review again");
}
