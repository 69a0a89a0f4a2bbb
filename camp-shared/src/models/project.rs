/// Project model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Creating a project always creates the creator's Admin membership in the
/// same transaction; a project never exists without at least one admin at
/// birth.
///
/// # Example
///
/// ```no_run
/// use camp_shared::models::project::{CreateProject, Project};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let project = Project::create_with_admin(&pool, CreateProject {
///     name: "Launch".to_string(),
///     description: Some("Q3 launch plan".to_string()),
///     created_by: user_id,
/// }).await?;
///
/// for summary in Project::list_for_user(&pool, user_id, None).await? {
///     println!("{} ({}%)", summary.project.name, summary.stats.progress);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::membership::ProjectRole;

/// Project row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Creator; None once the creator's account is deleted
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Task counts of a project, with a weighted completion percentage
///
/// In-progress tasks count for half, done tasks in full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub todo: i64,
    pub in_progress: i64,
    pub done: i64,
    pub total: i64,
    /// Rounded percentage in 0..=100
    pub progress: i64,
}

impl TaskStats {
    /// Builds stats from per-status counts
    pub fn from_counts(todo: i64, in_progress: i64, done: i64) -> Self {
        let total = todo + in_progress + done;
        let progress = if total > 0 {
            ((in_progress as f64 * 0.5 + done as f64) / total as f64 * 100.0).round() as i64
        } else {
            0
        };

        Self {
            todo,
            in_progress,
            done,
            total,
            progress,
        }
    }
}

/// A project as listed for one user: their role, headcount and progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
    pub member_count: i64,
    pub stats: TaskStats,
}

#[derive(sqlx::FromRow)]
struct ProjectSummaryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role: ProjectRole,
    member_count: i64,
    todo: i64,
    in_progress: i64,
    done: i64,
}

impl From<ProjectSummaryRow> for ProjectSummary {
    fn from(row: ProjectSummaryRow) -> Self {
        Self {
            project: Project {
                id: row.id,
                name: row.name,
                description: row.description,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            role: row.role,
            member_count: row.member_count,
            stats: TaskStats::from_counts(row.todo, row.in_progress, row.done),
        }
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Project {
    /// Creates a project and the creator's Admin membership atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the creator doesn't exist or the transaction
    /// fails; in either case nothing is persisted.
    pub async fn create_with_admin(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(project.id)
        .bind(data.created_by)
        .bind(ProjectRole::Admin)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(project)
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Applies a partial update
    ///
    /// Returns None if the project doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Deletes a project; members, tasks, notes and files cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists projects the user is a member of, newest first
    ///
    /// `search` filters by case-insensitive substring of the name.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query_as::<_, ProjectSummaryRow>(
            r#"
            SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at,
                   pm.role,
                   (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id) AS member_count,
                   COUNT(t.id) FILTER (WHERE t.status = 'todo') AS todo,
                   COUNT(t.id) FILTER (WHERE t.status = 'in_progress') AS in_progress,
                   COUNT(t.id) FILTER (WHERE t.status = 'done') AS done
            FROM projects p
            JOIN project_members pm ON pm.project_id = p.id AND pm.user_id = $1
            LEFT JOIN tasks t ON t.project_id = p.id
            WHERE $2::TEXT IS NULL OR p.name ILIKE $2
            GROUP BY p.id, pm.role
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(ProjectSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_empty_project() {
        let stats = TaskStats::from_counts(0, 0, 0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.progress, 0);
    }

    #[test]
    fn test_stats_weighted_progress() {
        // (1 * 0.5 + 1) / 4 = 37.5 -> 38
        let stats = TaskStats::from_counts(2, 1, 1);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.progress, 38);

        assert_eq!(TaskStats::from_counts(0, 0, 3).progress, 100);
        assert_eq!(TaskStats::from_counts(0, 2, 0).progress, 50);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
    }
}
