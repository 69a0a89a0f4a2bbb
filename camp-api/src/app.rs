/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use camp_api::{app::{build_router, AppState}, config::Config};
/// use camp_shared::{mail::LogMailer, store::Stores};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(Stores::postgres(pool.clone()), Arc::new(LogMailer), config)
///     .with_database(pool);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use camp_shared::{
    auth::{
        authorization::Authorizer,
        guard::Authenticator,
        jwt::{SessionTokenCodec, TokenSettings},
        lifecycle::{LifecycleConfig, TokenLifecycle},
    },
    mail::Mailer,
    store::Stores,
};
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub authenticator: Authenticator,
    pub authorizer: Authorizer,
    pub lifecycle: TokenLifecycle,
    pub mailer: Arc<dyn Mailer>,

    /// Only used by the health check; absent for in-memory stores
    pub db: Option<PgPool>,

    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the auth components onto a set of stores
    pub fn new(stores: Stores, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        let codec = SessionTokenCodec::new(
            TokenSettings::new(
                config.jwt.access_secret.clone(),
                Duration::seconds(config.jwt.access_ttl_secs),
            ),
            TokenSettings::new(
                config.jwt.refresh_secret.clone(),
                Duration::seconds(config.jwt.refresh_ttl_secs),
            ),
        );

        let lifecycle = TokenLifecycle::new(
            stores.users.clone(),
            codec.clone(),
            LifecycleConfig {
                temporary_token_ttl: Duration::seconds(config.tokens.temporary_ttl_secs),
                revoke_refresh_on_logout: config.tokens.revoke_refresh_on_logout,
            },
        );

        Self {
            authenticator: Authenticator::new(stores.users.clone(), codec),
            authorizer: Authorizer::new(stores.members.clone(), stores.tasks.clone()),
            lifecycle,
            mailer,
            db: None,
            stores,
            config: Arc::new(config),
        }
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /api/v1
/// ├── GET  /healthcheck
/// ├── /auth
/// │   ├── POST /register, /login, /refresh-token, /forgot-password, /logout
/// │   ├── GET  /verify-email/:token
/// │   ├── POST /reset-password/:token
/// │   └── POST /current-user, /change-password,
/// │            /resend-email-verification                 (authenticated)
/// ├── /projects                                           (authenticated)
/// │   ├── GET|POST /
/// │   ├── GET|PUT|DELETE /:project_id
/// │   ├── GET /:project_id/role
/// │   ├── GET|POST /:project_id/members
/// │   ├── PUT|DELETE /:project_id/members/:user_id
/// │   ├── GET|POST /:project_id/tasks
/// │   ├── GET|POST /:project_id/notes
/// │   ├── GET|PUT|DELETE /:project_id/notes/:note_id
/// │   ├── GET|POST /:project_id/files
/// │   └── DELETE /:project_id/files/:file_id
/// ├── /tasks/:task_id                                     (authenticated)
/// │   ├── GET|PUT|DELETE /
/// │   ├── PATCH /status
/// │   └── GET|POST /subtasks
/// └── /subtasks/:subtask_id  PUT|DELETE                   (authenticated)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (protected routers only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, files, health, members, notes, projects, tasks};

    let require_auth = || {
        axum::middleware::from_fn_with_state(state.clone(), crate::middleware::auth::require_auth)
    };

    let public_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/logout", post(auth::logout))
        .route("/verify-email/:token", get(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/:token", post(auth::reset_password));

    let protected_auth_routes = Router::new()
        .route("/current-user", post(auth::current_user).get(auth::current_user))
        .route("/change-password", post(auth::change_password))
        .route(
            "/resend-email-verification",
            post(auth::resend_email_verification),
        )
        .route_layer(require_auth());

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:project_id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/:project_id/role", get(members::get_own_role))
        .route(
            "/:project_id/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/:project_id/members/:user_id",
            put(members::update_member_role).delete(members::remove_member),
        )
        .route(
            "/:project_id/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/:project_id/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route(
            "/:project_id/notes/:note_id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route(
            "/:project_id/files",
            get(files::list_files).post(files::upload_file),
        )
        .route(
            "/:project_id/files/:file_id",
            axum::routing::delete(files::delete_file),
        )
        .route_layer(require_auth());

    let task_routes = Router::new()
        .route(
            "/:task_id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/:task_id/status", patch(tasks::update_task_status))
        .route(
            "/:task_id/subtasks",
            get(tasks::list_subtasks).post(tasks::create_subtask),
        )
        .route_layer(require_auth());

    let subtask_routes = Router::new()
        .route(
            "/:subtask_id",
            put(tasks::update_subtask).delete(tasks::delete_subtask),
        )
        .route_layer(require_auth());

    let v1_routes = Router::new()
        .route("/healthcheck", get(health::health_check))
        .nest("/auth", public_auth_routes.merge(protected_auth_routes))
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/subtasks", subtask_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
