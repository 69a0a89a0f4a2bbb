/// Project note model and database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Free-text note pinned to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectNote {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a note
#[derive(Debug, Clone)]
pub struct CreateNote {
    pub project_id: Uuid,
    pub created_by: Uuid,
    pub content: String,
}

impl ProjectNote {
    pub async fn create(pool: &PgPool, data: CreateNote) -> Result<Self, sqlx::Error> {
        let note = sqlx::query_as::<_, ProjectNote>(
            r#"
            INSERT INTO project_notes (project_id, created_by, content)
            VALUES ($1, $2, $3)
            RETURNING id, project_id, created_by, content, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.created_by)
        .bind(data.content)
        .fetch_one(pool)
        .await?;

        Ok(note)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let note = sqlx::query_as::<_, ProjectNote>(
            r#"
            SELECT id, project_id, created_by, content, created_at, updated_at
            FROM project_notes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(note)
    }

    /// Lists notes of a project, newest first
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let notes = sqlx::query_as::<_, ProjectNote>(
            r#"
            SELECT id, project_id, created_by, content, created_at, updated_at
            FROM project_notes
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(notes)
    }

    pub async fn update(pool: &PgPool, id: Uuid, content: &str) -> Result<Option<Self>, sqlx::Error> {
        let note = sqlx::query_as::<_, ProjectNote>(
            r#"
            UPDATE project_notes
            SET content = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, created_by, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(pool)
        .await?;

        Ok(note)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM project_notes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
