/// Integration tests for project-scoped authorization
///
/// Everything runs against the in-memory store, so no database is needed:
/// cargo test -p camp-shared --test authorization_tests

use camp_shared::{
    auth::{
        authorization::{AccessPolicy, AuthzError, Authorizer, Grant, Operation, ResourceKind, ResourceScope},
        guard::Identity,
    },
    models::{
        membership::ProjectRole,
        project::{CreateProject, Project},
        subtask::{CreateSubtask, Subtask},
        task::{CreateTask, Task, TaskStatus},
        user::{CreateUser, UserProfile},
    },
    store::{memory::MemoryStore, MembershipStore, ProjectStore, Stores, TaskStore, UserStore},
};
use uuid::Uuid;

struct World {
    stores: Stores,
    authorizer: Authorizer,
    admin: Identity,
    project: Project,
    task: Task,
    subtask: Subtask,
}

async fn user(stores: &Stores, name: &str) -> Identity {
    let user = stores
        .users
        .create_user(CreateUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            full_name: None,
            password_hash: "unused".to_string(),
        })
        .await
        .unwrap();
    UserProfile::from(user)
}

async fn world() -> World {
    let stores = Stores::memory(MemoryStore::new());
    let admin = user(&stores, "creator").await;

    let project = stores
        .projects
        .create_project(CreateProject {
            name: "Launch".to_string(),
            description: None,
            created_by: admin.id,
        })
        .await
        .unwrap();

    let task = stores
        .tasks
        .create_task(CreateTask {
            project_id: project.id,
            title: "Write copy".to_string(),
            description: None,
            assigned_to: None,
            assigned_by: admin.id,
            status: TaskStatus::Todo,
        })
        .await
        .unwrap();

    let subtask = stores
        .tasks
        .create_subtask(CreateSubtask {
            task_id: task.id,
            title: "Headline".to_string(),
            created_by: admin.id,
        })
        .await
        .unwrap();

    let authorizer = Authorizer::new(stores.members.clone(), stores.tasks.clone());

    World {
        stores,
        authorizer,
        admin,
        project,
        task,
        subtask,
    }
}

async fn member_with_role(w: &World, name: &str, role: ProjectRole) -> Identity {
    let identity = user(&w.stores, name).await;
    w.stores
        .members
        .upsert_member(w.project.id, identity.id, role)
        .await
        .unwrap();
    identity
}

#[tokio::test]
async fn test_creator_is_admin() {
    let w = world().await;

    let ctx = w
        .authorizer
        .authorize(
            &w.admin,
            &ResourceScope::Project(w.project.id),
            &Operation::DeleteProject.policy(),
        )
        .await
        .unwrap();

    assert_eq!(ctx.project_id, w.project.id);
    assert_eq!(ctx.role, ProjectRole::Admin);
    assert_eq!(ctx.granted_by, Grant::Role);
}

#[tokio::test]
async fn test_decision_follows_membership_and_role_set() {
    let w = world().await;
    let outsider = user(&w.stores, "outsider").await;
    let member = member_with_role(&w, "member", ProjectRole::Member).await;
    let lead = member_with_role(&w, "lead", ProjectRole::ProjectAdmin).await;
    let scope = ResourceScope::Project(w.project.id);

    let policies = [
        AccessPolicy::any_member(),
        Operation::CreateTask.policy(),
        Operation::AddMember.policy(),
    ];

    for policy in policies {
        assert!(matches!(
            w.authorizer.authorize(&outsider, &scope, &policy).await,
            Err(AuthzError::NotAMember)
        ));

        for (identity, role) in [
            (&w.admin, ProjectRole::Admin),
            (&member, ProjectRole::Member),
            (&lead, ProjectRole::ProjectAdmin),
        ] {
            let allowed = policy.required_roles().is_empty() || policy.required_roles().contains(&role);
            let result = w.authorizer.authorize(identity, &scope, &policy).await;

            if allowed {
                assert_eq!(result.unwrap().role, role);
            } else {
                assert!(matches!(result, Err(AuthzError::InsufficientRole)));
            }
        }
    }
}

#[tokio::test]
async fn test_subtask_resolves_through_task_to_project() {
    let w = world().await;
    let member = member_with_role(&w, "member", ProjectRole::Member).await;
    let scope = ResourceScope::Subtask(w.subtask.id);

    assert_eq!(w.authorizer.resolve_project(&scope).await.unwrap(), w.project.id);

    let ctx = w
        .authorizer
        .authorize(&member, &scope, &Operation::UpdateSubtask.policy())
        .await
        .unwrap();
    assert_eq!(ctx.project_id, w.project.id);

    w.stores
        .members
        .remove_member(w.project.id, member.id)
        .await
        .unwrap();

    assert!(matches!(
        w.authorizer
            .authorize(&member, &scope, &Operation::UpdateSubtask.policy())
            .await,
        Err(AuthzError::NotAMember)
    ));
}

#[tokio::test]
async fn test_missing_resources_on_resolution_path() {
    let w = world().await;

    assert!(matches!(
        w.authorizer
            .authorize(&w.admin, &ResourceScope::Task(Uuid::new_v4()), &AccessPolicy::any_member())
            .await,
        Err(AuthzError::ResourceNotFound(ResourceKind::Task))
    ));

    assert!(matches!(
        w.authorizer
            .authorize(&w.admin, &ResourceScope::Subtask(Uuid::new_v4()), &AccessPolicy::any_member())
            .await,
        Err(AuthzError::ResourceNotFound(ResourceKind::Subtask))
    ));

    assert!(matches!(
        ResourceScope::task("12345"),
        Err(AuthzError::MalformedResourceId { kind: ResourceKind::Task, .. })
    ));
}

#[tokio::test]
async fn test_promotion_unlocks_task_deletion() {
    let w = world().await;
    let member = member_with_role(&w, "member", ProjectRole::Member).await;
    let scope = ResourceScope::Task(w.task.id);
    let policy = Operation::DeleteTask.policy();

    assert!(matches!(
        w.authorizer.authorize(&member, &scope, &policy).await,
        Err(AuthzError::InsufficientRole)
    ));

    w.stores
        .members
        .update_member_role(w.project.id, member.id, ProjectRole::ProjectAdmin)
        .await
        .unwrap()
        .unwrap();

    let ctx = w.authorizer.authorize(&member, &scope, &policy).await.unwrap();
    assert_eq!(ctx.role, ProjectRole::ProjectAdmin);
}

#[tokio::test]
async fn test_creator_without_membership_has_no_access() {
    let w = world().await;

    w.stores
        .members
        .remove_member(w.project.id, w.admin.id)
        .await
        .unwrap();

    for scope in [
        ResourceScope::Project(w.project.id),
        ResourceScope::Task(w.task.id),
        ResourceScope::Subtask(w.subtask.id),
    ] {
        assert!(matches!(
            w.authorizer
                .authorize(&w.admin, &scope, &Operation::ListTasks.policy())
                .await,
            Err(AuthzError::NotAMember)
        ));
    }
}

#[tokio::test]
async fn test_owner_passes_elevated_policy() {
    let w = world().await;
    let uploader = member_with_role(&w, "uploader", ProjectRole::Member).await;
    let other = member_with_role(&w, "other", ProjectRole::Member).await;
    let scope = ResourceScope::Project(w.project.id);

    let policy = Operation::DeleteFile.policy().or_owned_by(uploader.id);

    let ctx = w.authorizer.authorize(&uploader, &scope, &policy).await.unwrap();
    assert_eq!(ctx.granted_by, Grant::Ownership);

    assert!(matches!(
        w.authorizer.authorize(&other, &scope, &policy).await,
        Err(AuthzError::InsufficientRole)
    ));

    let ctx = w.authorizer.authorize(&w.admin, &scope, &policy).await.unwrap();
    assert_eq!(ctx.granted_by, Grant::Role);
}
