/// User model and database operations
///
/// A user is both an identity and a credential holder. Besides the Argon2id
/// password hash, the row carries the single currently valid refresh token
/// and two single-use token slots (email verification, password reset),
/// each stored as a SHA-256 digest plus expiry.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(64) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     full_name VARCHAR(255),
///     avatar_url VARCHAR(512),
///     password_hash VARCHAR(255) NOT NULL,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     refresh_token TEXT,
///     email_verification_token VARCHAR(64),
///     email_verification_expiry TIMESTAMPTZ,
///     forgot_password_token VARCHAR(64),
///     forgot_password_expiry TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Token digest and expiry columns are constrained to be both NULL or both
/// set.
///
/// # Example
///
/// ```no_run
/// use camp_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     username: "jdoe".to_string(),
///     email: "jdoe@example.com".to_string(),
///     full_name: Some("John Doe".to_string()),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "jdoe@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, full_name, avatar_url, password_hash, \
     email_verified, refresh_token, email_verification_token, email_verification_expiry, \
     forgot_password_token, forgot_password_expiry, created_at, updated_at";

const PROFILE_COLUMNS: &str =
    "id, username, email, full_name, avatar_url, email_verified, created_at, updated_at";

/// Full user row, including credential state
///
/// Never serialized: handlers work with [`UserProfile`] instead.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Unique, lowercased login name
    pub username: String,

    /// Unique, lowercased email address
    pub email: String,

    /// Optional display name
    pub full_name: Option<String>,

    /// Optional avatar URL
    pub avatar_url: Option<String>,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    /// Set once the verification link has been consumed
    pub email_verified: bool,

    /// The only refresh token currently accepted for this user
    pub refresh_token: Option<String>,

    /// SHA-256 digest of the outstanding verification token
    pub email_verification_token: Option<String>,

    /// Expiry of the outstanding verification token
    pub email_verification_expiry: Option<DateTime<Utc>>,

    /// SHA-256 digest of the outstanding password reset token
    pub forgot_password_token: Option<String>,

    /// Expiry of the outstanding password reset token
    pub forgot_password_expiry: Option<DateTime<Utc>>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// User projection without any credential material
///
/// This is what the authentication guard attaches to a request and what
/// endpoints return about users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Input for creating a new user
///
/// `username` and `email` are expected to be normalized (trimmed and
/// lowercased) by the caller; the schema rejects mixed case.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,
}

/// Persisted form of a single-use token: digest plus expiry
///
/// Setting a slot to `Some(digest)` replaces whatever was outstanding;
/// setting it to `None` clears both columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest {
    /// Hex-encoded SHA-256 of the unhashed token
    pub hash: String,

    /// Instant after which the token is no longer accepted
    pub expires_at: DateTime<Utc>,
}

impl TokenDigest {
    /// Whether this digest is still accepted at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl User {
    /// Outstanding email verification token, if any
    pub fn email_verification(&self) -> Option<TokenDigest> {
        token_pair(
            &self.email_verification_token,
            self.email_verification_expiry,
        )
    }

    /// Outstanding password reset token, if any
    pub fn password_reset(&self) -> Option<TokenDigest> {
        token_pair(&self.forgot_password_token, self.forgot_password_expiry)
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the username or email is already taken (unique
    /// constraint violation) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, full_name, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.username)
            .bind(data.email)
            .bind(data.full_name)
            .bind(data.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Loads only the public columns of a user
    ///
    /// Used by the authentication guard so credential material never
    /// leaves the database on an ordinary request.
    pub async fn find_profile(pool: &PgPool, id: Uuid) -> Result<Option<UserProfile>, sqlx::Error> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, UserProfile>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address
    ///
    /// The address is lowercased before comparison.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Finds a user holding either the email or the username
    ///
    /// Registration uses this to reject duplicates before hashing the
    /// password.
    pub async fn find_by_email_or_username(
        pool: &PgPool,
        email: &str,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2 LIMIT 1"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(email.trim().to_lowercase())
            .bind(username.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Finds the user whose verification digest matches and has not expired
    ///
    /// Expired digests are left in place; they simply stop matching.
    pub async fn find_by_email_verification_token(
        pool: &PgPool,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email_verification_token = $1 AND email_verification_expiry > $2"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Finds the user whose reset digest matches and has not expired
    pub async fn find_by_password_reset_token(
        pool: &PgPool,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE forgot_password_token = $1 AND forgot_password_expiry > $2"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Replaces (or clears) the stored refresh token
    ///
    /// Returns false if the user doesn't exist.
    pub async fn set_refresh_token(
        pool: &PgPool,
        id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(refresh_token)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces (or clears) the verification digest/expiry pair
    pub async fn set_email_verification_token(
        pool: &PgPool,
        id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users \
             SET email_verification_token = $2, email_verification_expiry = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token.map(|t| t.hash.as_str()))
        .bind(token.map(|t| t.expires_at))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks the email verified and clears the verification pair
    ///
    /// Only matches while `token_hash` is still the stored digest, so a token
    /// replaced after lookup is not consumed.
    pub async fn complete_email_verification(
        pool: &PgPool,
        id: Uuid,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users \
             SET email_verified = TRUE, email_verification_token = NULL, \
                 email_verification_expiry = NULL, updated_at = NOW() \
             WHERE id = $1 AND email_verification_token = $2",
        )
        .bind(id)
        .bind(token_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces (or clears) the password reset digest/expiry pair
    pub async fn set_password_reset_token(
        pool: &PgPool,
        id: Uuid,
        token: Option<&TokenDigest>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users \
             SET forgot_password_token = $2, forgot_password_expiry = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token.map(|t| t.hash.as_str()))
        .bind(token.map(|t| t.expires_at))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a new password hash and clears the reset pair in one statement
    pub async fn complete_password_reset(
        pool: &PgPool,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users \
             SET password_hash = $3, forgot_password_token = NULL, \
                 forgot_password_expiry = NULL, updated_at = NOW() \
             WHERE id = $1 AND forgot_password_token = $2",
        )
        .bind(id)
        .bind(token_hash)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a new password hash
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn token_pair(hash: &Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<TokenDigest> {
    match (hash, expires_at) {
        (Some(hash), Some(expires_at)) => Some(TokenDigest {
            hash: hash.clone(),
            expires_at,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            full_name: None,
            avatar_url: None,
            password_hash: "$argon2id$secret".to_string(),
            email_verified: false,
            refresh_token: Some("refresh".to_string()),
            email_verification_token: None,
            email_verification_expiry: None,
            forgot_password_token: None,
            forgot_password_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_profile_drops_credentials() {
        let user = sample_user();
        let id = user.id;
        let profile = UserProfile::from(user);

        assert_eq!(profile.id, id);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("refresh"));
    }

    #[test]
    fn test_token_pair_requires_both_columns() {
        let mut user = sample_user();
        assert!(user.email_verification().is_none());

        user.email_verification_token = Some("abc".to_string());
        assert!(user.email_verification().is_none());

        user.email_verification_expiry = Some(Utc::now() + Duration::minutes(20));
        let digest = user.email_verification().unwrap();
        assert_eq!(digest.hash, "abc");
    }

    #[test]
    fn test_token_digest_liveness() {
        let now = Utc::now();
        let digest = TokenDigest {
            hash: "abc".to_string(),
            expires_at: now,
        };

        assert!(digest.is_live_at(now - Duration::seconds(1)));
        assert!(!digest.is_live_at(now));
        assert!(!digest.is_live_at(now + Duration::seconds(1)));
    }
}
