/// In-memory stores
///
/// One set of tables behind a single `tokio::sync::RwLock`, implementing
/// every store trait. Rows are kept in insertion order so listings are
/// deterministic. Cascading deletes mirror the `ON DELETE CASCADE` clauses
/// of the SQL schema.
///
/// # Example
///
/// ```
/// use camp_shared::models::user::CreateUser;
/// use camp_shared::store::{memory::MemoryStore, UserStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), camp_shared::store::StoreError> {
/// let store = MemoryStore::new();
/// let user = store.create_user(CreateUser {
///     username: "jdoe".to_string(),
///     email: "jdoe@example.com".to_string(),
///     full_name: None,
///     password_hash: "hash".to_string(),
/// }).await?;
///
/// assert!(store.find_user(user.id).await?.is_some());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FileStore, MembershipStore, NoteStore, ProjectStore, StoreError, TaskStore, UserStore};
use crate::models::membership::{ProjectMember, ProjectMemberDetail, ProjectRole};
use crate::models::note::{CreateNote, ProjectNote};
use crate::models::project::{CreateProject, Project, ProjectSummary, TaskStats, UpdateProject};
use crate::models::project_file::{CreateProjectFile, ProjectFile};
use crate::models::subtask::{CreateSubtask, Subtask, UpdateSubtask};
use crate::models::task::{CreateTask, Task, TaskStatus, UpdateTask};
use crate::models::user::{CreateUser, TokenDigest, User, UserProfile};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    members: Vec<ProjectMember>,
    tasks: Vec<Task>,
    subtasks: Vec<Subtask>,
    notes: Vec<ProjectNote>,
    files: Vec<ProjectFile>,
}

impl Tables {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// Store implementation over in-process tables
///
/// Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn digest_matches(
    hash: &Option<String>,
    expiry: Option<DateTime<Utc>>,
    token_hash: &str,
    now: DateTime<Utc>,
) -> bool {
    match (hash, expiry) {
        (Some(hash), Some(expiry)) => hash == token_hash && expiry > now,
        _ => false,
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.iter().any(|u| u.email == data.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        if tables.users.iter().any(|u| u.username == data.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: data.username,
            email: data.email,
            full_name: data.full_name,
            avatar_url: None,
            password_hash: data.password_hash,
            email_verified: false,
            refresh_token: None,
            email_verification_token: None,
            email_verification_expiry: None,
            forgot_password_token: None,
            forgot_password_expiry: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.find_user(id).await?.map(UserProfile::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        let username = username.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }

    async fn find_user_by_email_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| {
                digest_matches(
                    &u.email_verification_token,
                    u.email_verification_expiry,
                    token_hash,
                    now,
                )
            })
            .cloned())
    }

    async fn find_user_by_password_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| {
                digest_matches(&u.forgot_password_token, u.forgot_password_expiry, token_hash, now)
            })
            .cloned())
    }

    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) => {
                user.refresh_token = refresh_token.map(str::to_string);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn set_email_verification_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) => {
                user.email_verification_token = token.map(|t| t.hash.clone());
                user.email_verification_expiry = token.map(|t| t.expires_at);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) if user.email_verification_token.as_deref() == Some(token_hash) => {
                user.email_verified = true;
                user.email_verification_token = None;
                user.email_verification_expiry = None;
                user.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn set_password_reset_token(
        &self,
        user_id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) => {
                user.forgot_password_token = token.map(|t| t.hash.clone());
                user.forgot_password_expiry = token.map(|t| t.expires_at);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) if user.forgot_password_token.as_deref() == Some(token_hash) => {
                user.password_hash = password_hash.to_string();
                user.forgot_password_token = None;
                user.forgot_password_expiry = None;
                user.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn upsert_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
        {
            existing.role = role;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let member = ProjectMember {
            project_id,
            user_id,
            role,
            created_at: now,
            updated_at: now,
        };
        tables.members.push(member.clone());

        Ok(member)
    }

    async fn update_member_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .map(|m| {
                m.role = role;
                m.updated_at = Utc::now();
                m.clone()
            }))
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        Ok(tables.members.len() < before)
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<ProjectMemberDetail>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| {
                let user = tables.users.iter().find(|u| u.id == m.user_id)?;
                Some(ProjectMemberDetail {
                    project_id: m.project_id,
                    user_id: m.user_id,
                    username: user.username.clone(),
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                    avatar_url: user.avatar_url.clone(),
                    role: m.role,
                    created_at: m.created_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, data: CreateProject) -> Result<Project, StoreError> {
        let mut tables = self.tables.write().await;

        if !tables.users.iter().any(|u| u.id == data.created_by) {
            return Err(StoreError::Internal(format!(
                "creator {} does not exist",
                data.created_by
            )));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            created_by: Some(data.created_by),
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(project.clone());
        tables.members.push(ProjectMember {
            project_id: project.id,
            user_id: data.created_by,
            role: ProjectRole::Admin,
            created_at: now,
            updated_at: now,
        });

        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn update_project(
        &self,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Project>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.projects.iter_mut().find(|p| p.id == id).map(|p| {
            if let Some(name) = data.name {
                p.name = name;
            }
            if let Some(description) = data.description {
                p.description = Some(description);
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }

        let task_ids: Vec<Uuid> = tables
            .tasks
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        tables.subtasks.retain(|s| !task_ids.contains(&s.task_id));
        tables.tasks.retain(|t| t.project_id != id);
        tables.members.retain(|m| m.project_id != id);
        tables.notes.retain(|n| n.project_id != id);
        tables.files.retain(|f| f.project_id != id);

        Ok(true)
    }

    async fn list_projects_for_user(
        &self,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<ProjectSummary>, StoreError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let tables = self.tables.read().await;
        let summaries = tables
            .projects
            .iter()
            .rev()
            .filter(|p| {
                needle
                    .as_ref()
                    .map_or(true, |n| p.name.to_lowercase().contains(n.as_str()))
            })
            .filter_map(|p| {
                let membership = tables
                    .members
                    .iter()
                    .find(|m| m.project_id == p.id && m.user_id == user_id)?;

                let member_count = tables.members.iter().filter(|m| m.project_id == p.id).count();
                let count_status = |status: TaskStatus| {
                    tables
                        .tasks
                        .iter()
                        .filter(|t| t.project_id == p.id && t.status == status)
                        .count() as i64
                };

                Some(ProjectSummary {
                    project: p.clone(),
                    role: membership.role,
                    member_count: member_count as i64,
                    stats: TaskStats::from_counts(
                        count_status(TaskStatus::Todo),
                        count_status(TaskStatus::InProgress),
                        count_status(TaskStatus::Done),
                    ),
                })
            })
            .collect();

        Ok(summaries)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .iter()
            .rev()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            assigned_to: data.assigned_to,
            assigned_by: Some(data.assigned_by),
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(task.clone());

        Ok(task)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> Result<Option<Task>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.tasks.iter_mut().find(|t| t.id == id).map(|t| {
            if let Some(title) = data.title {
                t.title = title;
            }
            if let Some(description) = data.description {
                t.description = description;
            }
            if let Some(assigned_to) = data.assigned_to {
                t.assigned_to = assigned_to;
            }
            if let Some(status) = data.status {
                t.status = status;
            }
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        if tables.tasks.len() == before {
            return Ok(false);
        }
        tables.subtasks.retain(|s| s.task_id != id);
        Ok(true)
    }

    async fn find_subtask(&self, id: Uuid) -> Result<Option<Subtask>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.subtasks.iter().find(|s| s.id == id).cloned())
    }

    async fn list_subtasks(&self, task_id: Uuid) -> Result<Vec<Subtask>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .subtasks
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn create_subtask(&self, data: CreateSubtask) -> Result<Subtask, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let subtask = Subtask {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            title: data.title,
            is_completed: false,
            created_by: Some(data.created_by),
            created_at: now,
            updated_at: now,
        };
        tables.subtasks.push(subtask.clone());

        Ok(subtask)
    }

    async fn update_subtask(
        &self,
        id: Uuid,
        data: UpdateSubtask,
    ) -> Result<Option<Subtask>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.subtasks.iter_mut().find(|s| s.id == id).map(|s| {
            if let Some(title) = data.title {
                s.title = title;
            }
            if let Some(is_completed) = data.is_completed {
                s.is_completed = is_completed;
            }
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn delete_subtask(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.subtasks.len();
        tables.subtasks.retain(|s| s.id != id);
        Ok(tables.subtasks.len() < before)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn create_note(&self, data: CreateNote) -> Result<ProjectNote, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let note = ProjectNote {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            created_by: Some(data.created_by),
            content: data.content,
            created_at: now,
            updated_at: now,
        };
        tables.notes.push(note.clone());

        Ok(note)
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<ProjectNote>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notes(&self, project_id: Uuid) -> Result<Vec<ProjectNote>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .iter()
            .rev()
            .filter(|n| n.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn update_note(&self, id: Uuid, content: &str) -> Result<Option<ProjectNote>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.notes.iter_mut().find(|n| n.id == id).map(|n| {
            n.content = content.to_string();
            n.updated_at = Utc::now();
            n.clone()
        }))
    }

    async fn delete_note(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.notes.len();
        tables.notes.retain(|n| n.id != id);
        Ok(tables.notes.len() < before)
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn create_file(&self, data: CreateProjectFile) -> Result<ProjectFile, StoreError> {
        let mut tables = self.tables.write().await;
        let file = ProjectFile {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            uploaded_by: data.uploaded_by,
            name: data.name,
            url: data.url,
            content_type: data.content_type,
            size_bytes: data.size_bytes,
            created_at: Utc::now(),
        };
        tables.files.push(file.clone());

        Ok(file)
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<ProjectFile>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.files.iter().find(|f| f.id == id).cloned())
    }

    async fn list_files(&self, project_id: Uuid) -> Result<Vec<ProjectFile>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .iter()
            .rev()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.files.len();
        tables.files.retain(|f| f.id != id);
        Ok(tables.files.len() < before)
    }
}
