/// Store interfaces
///
/// Everything above the data layer (the authentication guard, the
/// authorization resolver, the token lifecycle and the HTTP handlers)
/// depends on these traits rather than on a database handle. Two
/// implementations ship with the crate:
///
/// - [`postgres::PgStore`]: sqlx/PostgreSQL, delegating to [`crate::models`]
/// - [`memory::MemoryStore`]: in-process tables behind a lock, for tests
///   and local demos
///
/// A [`Stores`] bundle carries one handle per trait so components can be
/// constructed with exactly the stores they need.
///
/// # Example
///
/// ```
/// use camp_shared::store::{memory::MemoryStore, Stores};
///
/// let stores = Stores::memory(MemoryStore::new());
/// let _users = stores.users.clone();
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::membership::{ProjectMember, ProjectMemberDetail, ProjectRole};
use crate::models::note::{CreateNote, ProjectNote};
use crate::models::project::{CreateProject, Project, ProjectSummary, UpdateProject};
use crate::models::project_file::{CreateProjectFile, ProjectFile};
use crate::models::subtask::{CreateSubtask, Subtask, UpdateSubtask};
use crate::models::task::{CreateTask, Task, UpdateTask};
use crate::models::user::{CreateUser, TokenDigest, User, UserProfile};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The underlying database failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other failure inside the store
    #[error("Store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Accounts and credential state
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user; `Conflict` if the email or username is taken
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Loads the credential-free projection of a user
    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Matches a verification digest whose expiry is after `now`
    async fn find_user_by_email_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Matches a reset digest whose expiry is after `now`
    async fn find_user_by_password_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn set_email_verification_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError>;

    /// Sets the verified flag and clears the verification pair
    ///
    /// Returns `false` unless `token_hash` is still the stored digest.
    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<bool, StoreError>;

    async fn set_password_reset_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError>;

    /// Stores the new password hash and clears the reset pair
    ///
    /// Returns `false` unless `token_hash` is still the stored digest.
    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError>;
}

/// Project roles
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMember>, StoreError>;

    /// Adds a member or overwrites the role of an existing one
    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError>;

    /// Returns None if the user is not a member
    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError>;

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<ProjectMemberDetail>, StoreError>;
}

/// Projects
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Creates the project and the creator's Admin membership atomically
    async fn create_project(&self, data: CreateProject) -> Result<Project, StoreError>;

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    async fn update_project(
        &self,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Project>, StoreError>;

    /// Deletes the project together with everything that belongs to it
    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_projects_for_user(
        &self,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<ProjectSummary>, StoreError>;
}

/// Tasks and subtasks
///
/// The authorization resolver walks subtask → task → project through this
/// trait, so it sits below the resolver and never depends on it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError>;

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> Result<Option<Task>, StoreError>;

    /// Deletes the task and its subtasks
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_subtask(&self, id: Uuid) -> Result<Option<Subtask>, StoreError>;

    async fn list_subtasks(&self, task_id: Uuid) -> Result<Vec<Subtask>, StoreError>;

    async fn create_subtask(&self, data: CreateSubtask) -> Result<Subtask, StoreError>;

    async fn update_subtask(
        &self,
        id: Uuid,
        data: UpdateSubtask,
    ) -> Result<Option<Subtask>, StoreError>;

    async fn delete_subtask(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Project notes
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, data: CreateNote) -> Result<ProjectNote, StoreError>;

    async fn find_note(&self, id: Uuid) -> Result<Option<ProjectNote>, StoreError>;

    async fn list_notes(&self, project_id: Uuid) -> Result<Vec<ProjectNote>, StoreError>;

    async fn update_note(&self, id: Uuid, content: &str) -> Result<Option<ProjectNote>, StoreError>;

    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Project file metadata
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create_file(&self, data: CreateProjectFile) -> Result<ProjectFile, StoreError>;

    async fn find_file(&self, id: Uuid) -> Result<Option<ProjectFile>, StoreError>;

    async fn list_files(&self, project_id: Uuid) -> Result<Vec<ProjectFile>, StoreError>;

    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// One handle per store trait
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub members: Arc<dyn MembershipStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub notes: Arc<dyn NoteStore>,
    pub files: Arc<dyn FileStore>,
}

impl Stores {
    /// All stores backed by one PostgreSQL pool
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_shared(Arc::new(postgres::PgStore::new(pool)))
    }

    /// All stores backed by one set of in-memory tables
    pub fn memory(store: memory::MemoryStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + MembershipStore + ProjectStore + TaskStore + NoteStore + FileStore + 'static,
    {
        Self {
            users: store.clone(),
            members: store.clone(),
            projects: store.clone(),
            tasks: store.clone(),
            notes: store.clone(),
            files: store,
        }
    }
}
