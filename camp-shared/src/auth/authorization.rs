/// Project-scoped authorization
///
/// Every protected resource resolves to exactly one project, and the
/// caller's membership in that project is the only source of privilege.
///
/// # Resolution
///
/// 1. **Project**: the id is taken as given.
/// 2. **Task**: task → its project.
/// 3. **Subtask**: subtask → its task → that task's project.
///
/// Then the membership row for (caller, project) is loaded; no row means
/// [`AuthzError::NotAMember`], whoever created the project. Finally the
/// operation's [`AccessPolicy`] is evaluated against the member's role and,
/// where the policy carries one, the ownership predicate.
///
/// The outcome is an [`AuthzContext`] handed to the handler alongside the
/// [`Identity`]; the identity itself is never modified.
///
/// # Example
///
/// ```no_run
/// use camp_shared::auth::authorization::{Authorizer, Operation, ResourceScope};
/// use camp_shared::auth::guard::Identity;
///
/// # async fn example(authorizer: Authorizer, identity: Identity, raw_id: &str)
/// #     -> Result<(), camp_shared::auth::authorization::AuthzError> {
/// let scope = ResourceScope::task(raw_id)?;
/// let ctx = authorizer
///     .authorize(&identity, &scope, &Operation::DeleteTask.policy())
///     .await?;
/// println!("deleting as {} in project {}", ctx.role, ctx.project_id);
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::guard::Identity;
use crate::models::membership::{ProjectMember, ProjectRole};
use crate::store::{MembershipStore, StoreError, TaskStore};

/// Kind of resource a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Task,
    Subtask,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Project => "Project",
            ResourceKind::Task => "Task",
            ResourceKind::Subtask => "Subtask",
        })
    }
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// A path id is not a well-formed UUID
    #[error("Invalid {kind} id: {raw}")]
    MalformedResourceId { kind: ResourceKind, raw: String },

    /// A task or subtask on the resolution path does not exist
    #[error("{0} not found")]
    ResourceNotFound(ResourceKind),

    /// The caller has no membership in the resolved project
    #[error("You are not a member of this project")]
    NotAMember,

    /// The caller's role is not in the required set and no ownership applies
    #[error("You do not have permission to perform this action")]
    InsufficientRole,

    /// A lookup failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Resource a request targets, identified by a validated id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    Project(Uuid),
    Task(Uuid),
    Subtask(Uuid),
}

impl ResourceScope {
    /// Parses a raw project id from a path segment
    pub fn project(raw: &str) -> Result<Self, AuthzError> {
        parse_id(raw, ResourceKind::Project).map(ResourceScope::Project)
    }

    /// Parses a raw task id from a path segment
    pub fn task(raw: &str) -> Result<Self, AuthzError> {
        parse_id(raw, ResourceKind::Task).map(ResourceScope::Task)
    }

    /// Parses a raw subtask id from a path segment
    pub fn subtask(raw: &str) -> Result<Self, AuthzError> {
        parse_id(raw, ResourceKind::Subtask).map(ResourceScope::Subtask)
    }

    /// Id of the targeted resource itself
    pub fn id(&self) -> Uuid {
        match *self {
            ResourceScope::Project(id) | ResourceScope::Task(id) | ResourceScope::Subtask(id) => id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceScope::Project(_) => ResourceKind::Project,
            ResourceScope::Task(_) => ResourceKind::Task,
            ResourceScope::Subtask(_) => ResourceKind::Subtask,
        }
    }
}

fn parse_id(raw: &str, kind: ResourceKind) -> Result<Uuid, AuthzError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AuthzError::MalformedResourceId {
        kind,
        raw: raw.to_string(),
    })
}

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// The policy admits any member
    Membership,
    /// The member's role is in the required set
    Role,
    /// The caller owns the resource
    Ownership,
}

/// Required roles plus an optional ownership predicate
///
/// An empty role set admits any member. With an owner set, the caller also
/// passes when they are that owner, provided they are still a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    roles: &'static [ProjectRole],
    owner: Option<Uuid>,
}

const ADMIN: &[ProjectRole] = &[ProjectRole::Admin];
const ELEVATED: &[ProjectRole] = &[ProjectRole::Admin, ProjectRole::ProjectAdmin];

impl AccessPolicy {
    /// Any member may proceed
    pub const fn any_member() -> Self {
        Self {
            roles: &[],
            owner: None,
        }
    }

    /// Only members holding one of `roles` may proceed
    pub const fn roles(roles: &'static [ProjectRole]) -> Self {
        Self { roles, owner: None }
    }

    /// Additionally admits the given resource owner
    pub fn or_owned_by(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn required_roles(&self) -> &'static [ProjectRole] {
        self.roles
    }

    /// Decides the policy for a member
    pub fn evaluate(&self, user_id: Uuid, membership: ProjectMember) -> Result<AuthzContext, AuthzError> {
        let granted_by = if self.roles.is_empty() {
            Grant::Membership
        } else if self.roles.contains(&membership.role) {
            Grant::Role
        } else if self.owner == Some(user_id) {
            Grant::Ownership
        } else {
            debug!(
                %user_id,
                project_id = %membership.project_id,
                role = %membership.role,
                required = ?self.roles,
                "Insufficient role"
            );
            return Err(AuthzError::InsufficientRole);
        };

        Ok(AuthzContext {
            project_id: membership.project_id,
            role: membership.role,
            membership,
            granted_by,
        })
    }
}

/// Result of a successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzContext {
    /// Project the resource resolved to
    pub project_id: Uuid,
    /// The caller's membership row
    pub membership: ProjectMember,
    /// The caller's role in the project
    pub role: ProjectRole,
    pub granted_by: Grant,
}

/// Every project-scoped operation of the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewProject,
    UpdateProject,
    DeleteProject,
    GetOwnRole,
    ListMembers,
    AddMember,
    UpdateMemberRole,
    RemoveMember,
    ListTasks,
    CreateTask,
    GetTask,
    UpdateTask,
    UpdateTaskStatus,
    DeleteTask,
    ListSubtasks,
    CreateSubtask,
    UpdateSubtask,
    RenameSubtask,
    DeleteSubtask,
    ListNotes,
    ViewNote,
    CreateNote,
    UpdateNote,
    DeleteNote,
    UploadFile,
    ListFiles,
    DeleteFile,
}

impl Operation {
    /// Role requirements of the operation
    ///
    /// `DeleteFile` is additionally satisfied by the uploader; callers add
    /// that with [`AccessPolicy::or_owned_by`] once the file is loaded.
    pub const fn policy(&self) -> AccessPolicy {
        match self {
            Operation::ViewProject
            | Operation::GetOwnRole
            | Operation::ListMembers
            | Operation::ListTasks
            | Operation::GetTask
            | Operation::UpdateTaskStatus
            | Operation::ListSubtasks
            | Operation::UpdateSubtask
            | Operation::ListNotes
            | Operation::ViewNote
            | Operation::CreateNote
            | Operation::UploadFile
            | Operation::ListFiles => AccessPolicy::any_member(),

            Operation::UpdateProject
            | Operation::DeleteProject
            | Operation::AddMember
            | Operation::UpdateMemberRole
            | Operation::RemoveMember
            | Operation::UpdateNote
            | Operation::DeleteNote => AccessPolicy::roles(ADMIN),

            Operation::CreateTask
            | Operation::UpdateTask
            | Operation::DeleteTask
            | Operation::CreateSubtask
            | Operation::RenameSubtask
            | Operation::DeleteSubtask
            | Operation::DeleteFile => AccessPolicy::roles(ELEVATED),
        }
    }
}

/// Resolves resources to projects and checks membership
#[derive(Clone)]
pub struct Authorizer {
    members: Arc<dyn MembershipStore>,
    tasks: Arc<dyn TaskStore>,
}

impl Authorizer {
    pub fn new(members: Arc<dyn MembershipStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { members, tasks }
    }

    /// Resolves the project a resource belongs to
    pub async fn resolve_project(&self, scope: &ResourceScope) -> Result<Uuid, AuthzError> {
        match *scope {
            ResourceScope::Project(project_id) => Ok(project_id),
            ResourceScope::Task(task_id) => self.task_project(task_id).await,
            ResourceScope::Subtask(subtask_id) => {
                let subtask = self
                    .tasks
                    .find_subtask(subtask_id)
                    .await?
                    .ok_or(AuthzError::ResourceNotFound(ResourceKind::Subtask))?;
                self.task_project(subtask.task_id).await
            }
        }
    }

    async fn task_project(&self, task_id: Uuid) -> Result<Uuid, AuthzError> {
        let task = self
            .tasks
            .find_task(task_id)
            .await?
            .ok_or(AuthzError::ResourceNotFound(ResourceKind::Task))?;
        Ok(task.project_id)
    }

    /// Resolves the caller's membership for a resource without judging it
    pub async fn membership(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<ProjectMember, AuthzError> {
        let project_id = self.resolve_project(scope).await?;

        self.members
            .find_member(project_id, identity.id)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %identity.id, %project_id, "Not a project member");
                AuthzError::NotAMember
            })
    }

    /// Resolves membership and evaluates a policy
    pub async fn authorize(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
        policy: &AccessPolicy,
    ) -> Result<AuthzContext, AuthzError> {
        let membership = self.membership(identity, scope).await?;
        policy.evaluate(identity.id, membership)
    }
}
