/// Project file metadata
///
/// Only the description of an uploaded file is stored here. Where the
/// bytes live (and how they got there) is decided by whatever storage
/// service produced `url`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// File attached to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectFile {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Owner; may always delete the file regardless of role
    pub uploaded_by: Uuid,
    pub name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a file
#[derive(Debug, Clone)]
pub struct CreateProjectFile {
    pub project_id: Uuid,
    pub uploaded_by: Uuid,
    pub name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl ProjectFile {
    pub async fn create(pool: &PgPool, data: CreateProjectFile) -> Result<Self, sqlx::Error> {
        let file = sqlx::query_as::<_, ProjectFile>(
            r#"
            INSERT INTO project_files (project_id, uploaded_by, name, url, content_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, project_id, uploaded_by, name, url, content_type, size_bytes, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.uploaded_by)
        .bind(data.name)
        .bind(data.url)
        .bind(data.content_type)
        .bind(data.size_bytes)
        .fetch_one(pool)
        .await?;

        Ok(file)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let file = sqlx::query_as::<_, ProjectFile>(
            r#"
            SELECT id, project_id, uploaded_by, name, url, content_type, size_bytes, created_at
            FROM project_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(file)
    }

    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let files = sqlx::query_as::<_, ProjectFile>(
            r#"
            SELECT id, project_id, uploaded_by, name, url, content_type, size_bytes, created_at
            FROM project_files
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(files)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM project_files WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
