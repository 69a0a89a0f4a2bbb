/// PostgreSQL-backed stores
///
/// Thin adapters from the store traits onto the model functions in
/// [`crate::models`]. The only logic here is error translation: unique
/// violations (SQLSTATE 23505) become [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{FileStore, MembershipStore, NoteStore, ProjectStore, StoreError, TaskStore, UserStore};
use crate::models::membership::{ProjectMember, ProjectMemberDetail, ProjectRole};
use crate::models::note::{CreateNote, ProjectNote};
use crate::models::project::{CreateProject, Project, ProjectSummary, UpdateProject};
use crate::models::project_file::{CreateProjectFile, ProjectFile};
use crate::models::subtask::{CreateSubtask, Subtask, UpdateSubtask};
use crate::models::task::{CreateTask, Task, UpdateTask};
use crate::models::user::{CreateUser, TokenDigest, User, UserProfile};

const UNIQUE_VIOLATION: &str = "23505";

/// Store implementation over a sqlx connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        User::create(&self.pool, data).await.map_err(map_write_error)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(User::find_profile(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email_or_username(&self.pool, email, username).await?)
    }

    async fn find_user_by_email_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email_verification_token(&self.pool, token_hash, now).await?)
    }

    async fn find_user_by_password_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_password_reset_token(&self.pool, token_hash, now).await?)
    }

    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(User::set_refresh_token(&self.pool, user_id, refresh_token).await?)
    }

    async fn set_email_verification_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError> {
        Ok(User::set_email_verification_token(&self.pool, user_id, token).await?)
    }

    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(User::complete_email_verification(&self.pool, user_id, token_hash).await?)
    }

    async fn set_password_reset_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError> {
        Ok(User::set_password_reset_token(&self.pool, user_id, token).await?)
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(User::complete_password_reset(&self.pool, user_id, token_hash, password_hash).await?)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        Ok(User::update_password(&self.pool, user_id, password_hash).await?)
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMember>, StoreError> {
        Ok(ProjectMember::find(&self.pool, project_id, user_id).await?)
    }

    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError> {
        ProjectMember::upsert(&self.pool, project_id, user_id, role)
            .await
            .map_err(map_write_error)
    }

    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError> {
        Ok(ProjectMember::update_role(&self.pool, project_id, user_id, role).await?)
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(ProjectMember::remove(&self.pool, project_id, user_id).await?)
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<ProjectMemberDetail>, StoreError> {
        Ok(ProjectMember::list_for_project(&self.pool, project_id).await?)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(&self, data: CreateProject) -> Result<Project, StoreError> {
        Project::create_with_admin(&self.pool, data)
            .await
            .map_err(map_write_error)
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(Project::find_by_id(&self.pool, id).await?)
    }

    async fn update_project(
        &self,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Project>, StoreError> {
        Ok(Project::update(&self.pool, id, data).await?)
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Project::delete(&self.pool, id).await?)
    }

    async fn list_projects_for_user(
        &self,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<ProjectSummary>, StoreError> {
        Ok(Project::list_for_user(&self.pool, user_id, search).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        Ok(Task::list_by_project(&self.pool, project_id).await?)
    }

    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        Ok(Task::create(&self.pool, data).await?)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> Result<Option<Task>, StoreError> {
        Ok(Task::update(&self.pool, id, data).await?)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn find_subtask(&self, id: Uuid) -> Result<Option<Subtask>, StoreError> {
        Ok(Subtask::find_by_id(&self.pool, id).await?)
    }

    async fn list_subtasks(&self, task_id: Uuid) -> Result<Vec<Subtask>, StoreError> {
        Ok(Subtask::list_by_task(&self.pool, task_id).await?)
    }

    async fn create_subtask(&self, data: CreateSubtask) -> Result<Subtask, StoreError> {
        Ok(Subtask::create(&self.pool, data).await?)
    }

    async fn update_subtask(
        &self,
        id: Uuid,
        data: UpdateSubtask,
    ) -> Result<Option<Subtask>, StoreError> {
        Ok(Subtask::update(&self.pool, id, data).await?)
    }

    async fn delete_subtask(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Subtask::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn create_note(&self, data: CreateNote) -> Result<ProjectNote, StoreError> {
        Ok(ProjectNote::create(&self.pool, data).await?)
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<ProjectNote>, StoreError> {
        Ok(ProjectNote::find_by_id(&self.pool, id).await?)
    }

    async fn list_notes(&self, project_id: Uuid) -> Result<Vec<ProjectNote>, StoreError> {
        Ok(ProjectNote::list_by_project(&self.pool, project_id).await?)
    }

    async fn update_note(&self, id: Uuid, content: &str) -> Result<Option<ProjectNote>, StoreError> {
        Ok(ProjectNote::update(&self.pool, id, content).await?)
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(ProjectNote::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl FileStore for PgStore {
    async fn create_file(&self, data: CreateProjectFile) -> Result<ProjectFile, StoreError> {
        Ok(ProjectFile::create(&self.pool, data).await?)
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<ProjectFile>, StoreError> {
        Ok(ProjectFile::find_by_id(&self.pool, id).await?)
    }

    async fn list_files(&self, project_id: Uuid) -> Result<Vec<ProjectFile>, StoreError> {
        Ok(ProjectFile::list_by_project(&self.pool, project_id).await?)
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(ProjectFile::delete(&self.pool, id).await?)
    }
}
