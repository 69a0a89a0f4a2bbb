/// Token lifecycle
///
/// Issues, stores and consumes every credential a user holds:
///
/// - **Session pair** (access + refresh JWT): issued on login and on every
///   refresh. Only the refresh token is persisted, and a presented refresh
///   token must equal the stored one byte for byte, so each rotation
///   invalidates the previous value.
/// - **Email verification** and **password reset** tokens: opaque,
///   single-use, persisted as digest + expiry.
///
/// Each opaque token purpose follows the same states:
///
/// ```text
/// Unissued ──issue──▶ Issued(hash, expiry) ──consume──▶ Unissued
///                         │      ▲
///                         └issue─┘   (reissue overwrites)
/// ```
///
/// Expiry is only checked when a token is presented; expired pairs stay in
/// the store until the next issuance overwrites them.
///
/// # Example
///
/// ```no_run
/// use camp_shared::auth::lifecycle::{Registration, TokenLifecycle};
///
/// # async fn example(lifecycle: TokenLifecycle) -> Result<(), camp_shared::auth::lifecycle::LifecycleError> {
/// let registered = lifecycle.register(Registration {
///     username: "jdoe".to_string(),
///     email: "jdoe@example.com".to_string(),
///     password: "launch2024".to_string(),
///     full_name: None,
/// }).await?;
///
/// // The unhashed token goes into the verification link
/// lifecycle.verify_email(&registered.verification_token).await?;
///
/// let session = lifecycle.login("jdoe@example.com", "launch2024").await?;
/// let rotated = lifecycle.refresh(&session.tokens.refresh_token).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::jwt::{JwtError, SessionTokenCodec};
use super::password::{hash_password, validate_password_strength, verify_password, PasswordError};
use super::temporary_token::{constant_time_eq, hash_token, TemporaryToken, DEFAULT_TTL_MINUTES};
use crate::models::user::{CreateUser, User, UserProfile};
use crate::store::{StoreError, UserStore};

/// Error type for credential lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Email or username is already registered
    #[error("User with this email or username already exists")]
    AlreadyExists,

    /// No user matches the given email or id
    #[error("User does not exist")]
    UserNotFound,

    /// Password does not match
    #[error("Invalid user credentials")]
    InvalidCredentials,

    /// Refresh token failed verification, names no user, or is not the
    /// currently stored one
    #[error("Refresh token is invalid or has been used")]
    InvalidRefreshToken,

    /// Opaque token is wrong, expired, or already consumed
    #[error("Token is invalid or expired")]
    TokenInvalidOrExpired,

    /// Verification requested for an already verified account
    #[error("Email is already verified")]
    AlreadyVerified,

    /// Password policy violation or hashing failure
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Signing a session token failed
    #[error("Token signing failed: {0}")]
    Jwt(#[source] JwtError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Lifecycle settings
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Lifetime of verification and reset tokens
    pub temporary_token_ttl: Duration,

    /// Whether logout also clears the stored refresh token
    pub revoke_refresh_on_logout: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            temporary_token_ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            revoke_refresh_on_logout: false,
        }
    }
}

/// Input for registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// A new account and the token for its verification link
#[derive(Debug, Clone)]
pub struct Registered {
    pub user: UserProfile,
    pub verification_token: String,
}

/// Freshly issued access and refresh tokens
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// An authenticated user with their new session
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub tokens: SessionTokens,
}

/// An opaque token issued for a user
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: UserProfile,
    /// Unhashed value for the link
    pub token: String,
}

/// Manages every credential a user holds
#[derive(Clone)]
pub struct TokenLifecycle {
    users: Arc<dyn UserStore>,
    codec: SessionTokenCodec,
    config: LifecycleConfig,
}

/// Lowercases and trims an email or username
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

impl TokenLifecycle {
    pub fn new(users: Arc<dyn UserStore>, codec: SessionTokenCodec, config: LifecycleConfig) -> Self {
        Self {
            users,
            codec,
            config,
        }
    }

    pub fn codec(&self) -> &SessionTokenCodec {
        &self.codec
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Creates an unverified account and issues its verification token
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the email or username is taken
    /// - `Password` if the password violates the policy
    pub async fn register(&self, data: Registration) -> Result<Registered, LifecycleError> {
        let email = normalize_identifier(&data.email);
        let username = normalize_identifier(&data.username);

        validate_password_strength(&data.password)?;

        if self
            .users
            .find_user_by_email_or_username(&email, &username)
            .await?
            .is_some()
        {
            return Err(LifecycleError::AlreadyExists);
        }

        let password_hash = hash_password(&data.password)?;

        let user = self
            .users
            .create_user(CreateUser {
                username,
                email,
                full_name: data.full_name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => LifecycleError::AlreadyExists,
                other => LifecycleError::Store(other),
            })?;

        let token = TemporaryToken::generate(self.config.temporary_token_ttl);
        self.users
            .set_email_verification_token(user.id, Some(&token.digest))
            .await?;

        info!(user_id = %user.id, "User registered");

        Ok(Registered {
            user: UserProfile::from(user),
            verification_token: token.unhashed,
        })
    }

    /// Checks a password and issues a session
    ///
    /// # Errors
    ///
    /// - `UserNotFound` for an unknown email
    /// - `InvalidCredentials` for a wrong password
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LifecycleError> {
        let user = self
            .users
            .find_user_by_email(&normalize_identifier(email))
            .await?
            .ok_or(LifecycleError::UserNotFound)?;

        if !verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(LifecycleError::InvalidCredentials);
        }

        let tokens = self.issue_session(&user).await?;
        info!(user_id = %user.id, "User logged in");

        Ok(Session {
            user: UserProfile::from(user),
            tokens,
        })
    }

    /// Signs a new session pair and stores its refresh token
    ///
    /// Any previously stored refresh token stops being accepted.
    pub async fn issue_session(&self, user: &User) -> Result<SessionTokens, LifecycleError> {
        let access_token = self
            .codec
            .issue_access(user.id, &user.email, &user.username)
            .map_err(LifecycleError::Jwt)?;
        let refresh_token = self
            .codec
            .issue_refresh(user.id)
            .map_err(LifecycleError::Jwt)?;

        self.users
            .set_refresh_token(user.id, Some(&refresh_token))
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Exchanges the current refresh token for a new session pair
    ///
    /// Two concurrent calls with the same token can both pass the equality
    /// check; the later write wins and the other caller's refresh token is
    /// dead on arrival.
    pub async fn refresh(&self, presented: &str) -> Result<Session, LifecycleError> {
        let claims = self.codec.verify_refresh(presented).map_err(|e| {
            debug!(error = %e, "Refresh token rejected by codec");
            LifecycleError::InvalidRefreshToken
        })?;

        let user = self
            .users
            .find_user(claims.sub)
            .await?
            .ok_or(LifecycleError::InvalidRefreshToken)?;

        let current = user.refresh_token.as_deref().unwrap_or_default();
        if !constant_time_eq(current, presented) {
            debug!(user_id = %user.id, "Refresh token is not the stored one");
            return Err(LifecycleError::InvalidRefreshToken);
        }

        let tokens = self.issue_session(&user).await?;
        debug!(user_id = %user.id, "Session refreshed");

        Ok(Session {
            user: UserProfile::from(user),
            tokens,
        })
    }

    /// Ends a session
    ///
    /// The stored refresh token is cleared only when
    /// `revoke_refresh_on_logout` is set. Returns whether it was cleared.
    pub async fn logout(&self, user_id: Uuid) -> Result<bool, LifecycleError> {
        if !self.config.revoke_refresh_on_logout {
            debug!(%user_id, "Logout without server-side revocation");
            return Ok(false);
        }

        self.users.set_refresh_token(user_id, None).await?;
        info!(%user_id, "Refresh token revoked on logout");
        Ok(true)
    }

    /// Consumes a verification token and marks the email verified
    pub async fn verify_email(&self, unhashed: &str) -> Result<UserProfile, LifecycleError> {
        let digest = hash_token(unhashed);
        let user = self
            .users
            .find_user_by_email_verification_token(&digest, Utc::now())
            .await?
            .ok_or(LifecycleError::TokenInvalidOrExpired)?;

        // A resend between lookup and consume replaces the digest
        if !self.users.complete_email_verification(user.id, &digest).await? {
            return Err(LifecycleError::TokenInvalidOrExpired);
        }
        info!(user_id = %user.id, "Email verified");

        let mut profile = UserProfile::from(user);
        profile.email_verified = true;
        Ok(profile)
    }

    /// Issues a new verification token, replacing any outstanding one
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user is gone
    /// - `AlreadyVerified` if there is nothing left to verify
    pub async fn resend_verification(&self, user_id: Uuid) -> Result<IssuedToken, LifecycleError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(LifecycleError::UserNotFound)?;

        if user.email_verified {
            return Err(LifecycleError::AlreadyVerified);
        }

        let token = TemporaryToken::generate(self.config.temporary_token_ttl);
        self.users
            .set_email_verification_token(user.id, Some(&token.digest))
            .await?;

        debug!(user_id = %user.id, "Verification token reissued");

        Ok(IssuedToken {
            user: UserProfile::from(user),
            token: token.unhashed,
        })
    }

    /// Issues a password reset token for an email address
    ///
    /// An unknown address is reported as `UserNotFound`, which tells the
    /// caller whether the address is registered.
    pub async fn forgot_password(&self, email: &str) -> Result<IssuedToken, LifecycleError> {
        let user = self
            .users
            .find_user_by_email(&normalize_identifier(email))
            .await?
            .ok_or(LifecycleError::UserNotFound)?;

        let token = TemporaryToken::generate(self.config.temporary_token_ttl);
        self.users
            .set_password_reset_token(user.id, Some(&token.digest))
            .await?;

        info!(user_id = %user.id, "Password reset requested");

        Ok(IssuedToken {
            user: UserProfile::from(user),
            token: token.unhashed,
        })
    }

    /// Consumes a reset token and sets a new password
    pub async fn reset_password(
        &self,
        unhashed: &str,
        new_password: &str,
    ) -> Result<UserProfile, LifecycleError> {
        validate_password_strength(new_password)?;

        let digest = hash_token(unhashed);
        let user = self
            .users
            .find_user_by_password_reset_token(&digest, Utc::now())
            .await?
            .ok_or(LifecycleError::TokenInvalidOrExpired)?;

        let password_hash = hash_password(new_password)?;
        if !self
            .users
            .complete_password_reset(user.id, &digest, &password_hash)
            .await?
        {
            return Err(LifecycleError::TokenInvalidOrExpired);
        }

        info!(user_id = %user.id, "Password reset");
        Ok(UserProfile::from(user))
    }

    /// Replaces the password of a signed-in user
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if `old_password` is wrong
    /// - `Password` if `new_password` violates the policy
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), LifecycleError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(LifecycleError::UserNotFound)?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(LifecycleError::InvalidCredentials);
        }

        validate_password_strength(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.users.update_password(user.id, &password_hash).await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
