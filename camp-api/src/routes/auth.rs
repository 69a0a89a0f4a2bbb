/// Authentication endpoints
///
/// # Endpoints
///
/// Public:
/// - `POST /api/v1/auth/register` - Register and send a verification email
/// - `POST /api/v1/auth/login` - Log in, set session cookies
/// - `POST /api/v1/auth/refresh-token` - Rotate the session pair
/// - `POST /api/v1/auth/logout` - Clear session cookies
/// - `GET  /api/v1/auth/verify-email/:token` - Consume a verification token
/// - `POST /api/v1/auth/forgot-password` - Email a reset link
/// - `POST /api/v1/auth/reset-password/:token` - Consume a reset token
///
/// Authenticated:
/// - `POST /api/v1/auth/current-user` - The caller's profile
/// - `POST /api/v1/auth/change-password` - Replace the password
/// - `POST /api/v1/auth/resend-email-verification` - Reissue the verification link
///
/// JSON field names are snake_case in requests and responses alike; only the
/// cookies keep their `accessToken` / `refreshToken` names.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use camp_shared::{
    auth::{
        guard::{Identity, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
        lifecycle::{Registration, Session, SessionTokens},
    },
    mail::{password_reset_email, verification_email},
    models::user::UserProfile,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 3, max = 50, message = "Username must be 3 to 50 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    /// Strength is checked by the password policy, not here
    pub password: String,

    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("username");
        err.message = Some("Username may only contain letters, digits, '.', '_' and '-'".into());
        Err(err)
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh request; the token may come from the cookie instead
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    pub new_password: String,
}

/// Response carrying a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

/// Login and refresh response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: SessionTokens,
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn with_session(jar: CookieJar, tokens: &SessionTokens, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        secure,
    ))
}

/// Expires both session cookies, whether or not the request carried them
fn without_session(jar: CookieJar, secure: bool) -> CookieJar {
    let expired = |name: &'static str| {
        let mut cookie = session_cookie(name, String::new(), secure);
        cookie.make_removal();
        cookie
    };

    jar.add(expired(ACCESS_TOKEN_COOKIE))
        .add(expired(REFRESH_TOKEN_COOKIE))
}

fn session_response(jar: CookieJar, session: Session, secure: bool) -> (CookieJar, Json<SessionResponse>) {
    let jar = with_session(jar, &session.tokens, secure);
    (
        jar,
        Json(SessionResponse {
            user: session.user,
            tokens: session.tokens,
        }),
    )
}

/// Register a new user
///
/// The account starts unverified; a verification link is mailed to the
/// given address. A delivery failure is logged and the account is still
/// reported as created; the user can ask for a new link after logging in.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Field validation failed
/// - `400 Bad Request`: Password violates the policy
/// - `409 Conflict`: Email or username already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    req.validate()?;

    let registered = state
        .lifecycle
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
            full_name: req.full_name,
        })
        .await?;

    let link = state
        .config
        .mail
        .verification_link(&registered.verification_token);
    if let Err(e) = state
        .mailer
        .send(verification_email(
            &registered.user.email,
            &registered.user.username,
            &link,
        ))
        .await
    {
        error!(user_id = %registered.user.id, error = %e, "Verification email not sent");
    }

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user: registered.user,
        }),
    ))
}

/// Log in with email and password
///
/// Sets HTTP-only `accessToken` and `refreshToken` cookies and returns the
/// same tokens in the body for non-browser clients.
///
/// # Errors
///
/// - `404 Not Found`: No user with this email
/// - `401 Unauthorized`: Wrong password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    req.validate()?;

    let session = state.lifecycle.login(&req.email, &req.password).await?;
    Ok(session_response(jar, session, state.config.cookies.secure))
}

/// Log out
///
/// Needs no valid credential and always clears both cookies, so a client
/// with an expired access token can still drop its refresh cookie. When the
/// caller is identifiable from the access token or the refresh cookie, the
/// stored refresh token is revoked if `AUTH_REVOKE_REFRESH_ON_LOGOUT` is set.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    match logout_subject(&state, &headers, &jar).await {
        Some(user_id) => {
            state.lifecycle.logout(user_id).await?;
            info!(%user_id, "User logged out");
        }
        None => warn!("Logout without a usable credential; clearing cookies only"),
    }

    let secure = state.config.cookies.secure;
    Ok((without_session(jar, secure), MessageResponse::new("User logged out")))
}

/// The user a logout request speaks for, if any credential still verifies
async fn logout_subject(state: &AppState, headers: &HeaderMap, jar: &CookieJar) -> Option<Uuid> {
    if let Ok(identity) = state.authenticator.authenticate(headers).await {
        return Some(identity.id);
    }

    let refresh = jar.get(REFRESH_TOKEN_COOKIE)?;
    state
        .lifecycle
        .codec()
        .verify_refresh(refresh.value())
        .ok()
        .map(|claims| claims.sub)
}

/// Exchange a refresh token for a new session pair
///
/// The token is taken from the `refreshToken` cookie, or from the
/// `refresh_token` body field.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid, expired or already rotated token
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?;

    let session = state.lifecycle.refresh(&presented).await?;
    Ok(session_response(jar, session, state.config.cookies.secure))
}

/// Consume an email verification token
///
/// # Errors
///
/// - `400 Bad Request`: Token is wrong, expired or already used
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.lifecycle.verify_email(&token).await?;
    Ok(Json(UserResponse { user }))
}

/// Email a new verification link, invalidating the previous one
///
/// # Errors
///
/// - `409 Conflict`: Email already verified
pub async fn resend_email_verification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MessageResponse>> {
    let issued = state.lifecycle.resend_verification(identity.id).await?;

    let link = state.config.mail.verification_link(&issued.token);
    state
        .mailer
        .send(verification_email(
            &issued.user.email,
            &issued.user.username,
            &link,
        ))
        .await?;

    Ok(MessageResponse::new("Verification email sent"))
}

/// Email a password reset link
///
/// # Errors
///
/// - `404 Not Found`: No user with this email
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let issued = state.lifecycle.forgot_password(&req.email).await?;

    let link = state.config.mail.reset_link(&issued.token);
    state
        .mailer
        .send(password_reset_email(
            &issued.user.email,
            &issued.user.username,
            &link,
        ))
        .await?;

    Ok(MessageResponse::new("Password reset email sent"))
}

/// Consume a reset token and set a new password
///
/// # Errors
///
/// - `400 Bad Request`: Token is wrong, expired or already used, or the new
///   password violates the policy
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .lifecycle
        .reset_password(&token, &req.new_password)
        .await?;

    Ok(MessageResponse::new("Password reset successfully"))
}

/// The authenticated caller
pub async fn current_user(Extension(identity): Extension<Identity>) -> Json<UserResponse> {
    Json(UserResponse { user: identity })
}

/// Replace the caller's password
///
/// # Errors
///
/// - `401 Unauthorized`: Old password is wrong
/// - `400 Bad Request`: New password violates the policy
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    state
        .lifecycle
        .change_password(identity.id, &req.old_password, &req.new_password)
        .await?;

    Ok(MessageResponse::new("Password changed successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "jdoe@example.com".to_string(),
            username: "jdoe".to_string(),
            password: "launch2024".to_string(),
            full_name: None,
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_username_characters() {
        assert!(validate_username("john.doe_99").is_ok());
        assert!(validate_username("john doe").is_err());
        assert!(validate_username("j@doe").is_err());
    }

    #[test]
    fn test_without_session_expires_both_cookies() {
        let jar = without_session(CookieJar::new(), false);

        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let cookie = jar.get(name).unwrap();
            assert_eq!(cookie.value(), "");
            assert!(cookie.max_age().is_some_and(|age| age.is_zero()));
        }
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie(ACCESS_TOKEN_COOKIE, "abc".to_string(), true);
        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
