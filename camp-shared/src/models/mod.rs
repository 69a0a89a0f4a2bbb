/// Database models for Project Camp
///
/// Each model owns its row type and the SQL that reads and writes it.
/// Nothing outside [`crate::store::postgres`] calls these functions
/// directly; the rest of the crate goes through the store traits.
///
/// # Models
///
/// - `user`: accounts, password hashes and token slots
/// - `membership`: project roles
/// - `project`: projects and per-user listings with task statistics
/// - `task` / `subtask`: the project board
/// - `note` / `project_file`: project attachments
///
/// # Example
///
/// ```no_run
/// use camp_shared::models::user::{User, CreateUser};
/// use camp_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "jdoe".to_string(),
///     email: "user@example.com".to_string(),
///     full_name: Some("John Doe".to_string()),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod membership;
pub mod note;
pub mod project;
pub mod project_file;
pub mod subtask;
pub mod task;
pub mod user;
