/// Authentication middleware
///
/// Runs the [`Authenticator`](camp_shared::auth::guard::Authenticator) on
/// every request of a protected router and stores the resulting
/// [`Identity`] in the request extensions. Handlers take it with
/// `Extension<Identity>`.
///
/// ```text
/// Request ──▶ bearer header / accessToken cookie ──▶ verify ──▶ load user
///                                                      │            │
///                                                     401          401
/// ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use camp_shared::auth::guard::Identity;
use tracing::debug;

use crate::{app::AppState, error::ApiError};

/// Rejects unauthenticated requests and attaches the caller's identity
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity: Identity = state.authenticator.authenticate(req.headers()).await?;

    debug!(user_id = %identity.id, path = %req.uri().path(), "Request authenticated");
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
