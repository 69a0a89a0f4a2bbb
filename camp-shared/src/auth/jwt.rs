/// Session token codec
///
/// Access and refresh tokens are HS256-signed JWTs. The two kinds are
/// signed with independent secrets and carry a `token_type` claim, so a
/// token of one kind is never accepted as the other.
///
/// # Claims
///
/// - access: `sub` (user id), `email`, `username`, `iss`, `iat`, `nbf`,
///   `exp`, `jti`, `token_type`
/// - refresh: `sub`, `iss`, `iat`, `nbf`, `exp`, `jti`, `token_type`
///
/// `jti` is random per token so two tokens minted in the same second for
/// the same user still differ, which refresh rotation relies on.
///
/// # Defaults
///
/// - access: 1 day
/// - refresh: 10 days
///
/// # Example
///
/// ```
/// use camp_shared::auth::jwt::{SessionTokenCodec, TokenSettings};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), camp_shared::auth::jwt::JwtError> {
/// let codec = SessionTokenCodec::new(
///     TokenSettings::new("access-secret-at-least-32-bytes-long!", Duration::days(1)),
///     TokenSettings::new("refresh-secret-at-least-32-bytes-long", Duration::days(10)),
/// );
///
/// let user_id = Uuid::new_v4();
/// let token = codec.issue_access(user_id, "jdoe@example.com", "jdoe")?;
/// let claims = codec.verify_access(&token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim stamped on and required from every session token
pub const ISSUER: &str = "projectcamp";

/// Error type for session token operations
///
/// Callers that authenticate requests collapse every variant into a single
/// "unauthenticated" outcome; the distinction exists for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    /// Failed to sign a token
    #[error("Failed to create token: {0}")]
    Encode(String),

    /// Signature does not verify under the expected secret
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is past its `exp`
    #[error("Token has expired")]
    Expired,

    /// Token is structurally invalid or carries unexpected claims
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// A refresh token was presented where an access token was expected,
    /// or the other way round
    #[error("Unexpected token type")]
    WrongTokenType,
}

/// Kind of session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub token_type: TokenType,
}

/// Claims of a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub token_type: TokenType,
}

trait TypedClaims {
    fn token_type(&self) -> TokenType;
}

impl TypedClaims for AccessClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

impl TypedClaims for RefreshClaims {
    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

/// Secret and lifetime for one token kind
#[derive(Clone)]
pub struct TokenSettings {
    secret: String,
    ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn from_settings(settings: &TokenSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            ttl: settings.ttl,
        }
    }
}

/// Issues and verifies access and refresh tokens
#[derive(Clone)]
pub struct SessionTokenCodec {
    access: Keys,
    refresh: Keys,
}

impl SessionTokenCodec {
    pub fn new(access: TokenSettings, refresh: TokenSettings) -> Self {
        Self {
            access: Keys::from_settings(&access),
            refresh: Keys::from_settings(&refresh),
        }
    }

    /// Lifetime of newly issued access tokens
    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    /// Lifetime of newly issued refresh tokens
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    /// Signs an access token for a user
    pub fn issue_access(&self, user_id: Uuid, email: &str, username: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            username: username.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.access.ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Access,
        };

        sign(&claims, &self.access.encoding)
    }

    /// Signs a refresh token for a user
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.refresh.ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Refresh,
        };

        sign(&claims, &self.refresh.encoding)
    }

    /// Verifies signature, issuer, time window and type of an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, JwtError> {
        verify(token, &self.access.decoding, TokenType::Access)
    }

    /// Verifies signature, issuer, time window and type of a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        verify(token, &self.refresh.decoding, TokenType::Refresh)
    }
}

fn sign<C: Serialize>(claims: &C, key: &EncodingKey) -> Result<String, JwtError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| JwtError::Encode(format!("Token encoding failed: {}", e)))
}

fn verify<C>(token: &str, key: &DecodingKey, expected: TokenType) -> Result<C, JwtError>
where
    C: DeserializeOwned + TypedClaims,
{
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let data = decode::<C>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Malformed(e.to_string()),
    })?;

    if data.claims.token_type() != expected {
        return Err(JwtError::WrongTokenType);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "access-secret-key-at-least-32-bytes";
    const REFRESH_SECRET: &str = "refresh-secret-key-at-least-32-bytes";

    fn codec_with(access_ttl: Duration, refresh_ttl: Duration) -> SessionTokenCodec {
        SessionTokenCodec::new(
            TokenSettings::new(ACCESS_SECRET, access_ttl),
            TokenSettings::new(REFRESH_SECRET, refresh_ttl),
        )
    }

    fn codec() -> SessionTokenCodec {
        codec_with(Duration::days(1), Duration::days(10))
    }

    #[test]
    fn test_access_token_carries_identity() {
        let codec = codec();
        let user_id = Uuid::new_v4();

        let token = codec.issue_access(user_id, "jdoe@example.com", "jdoe").unwrap();
        let claims = codec.verify_access(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "jdoe@example.com");
        assert_eq!(claims.username, "jdoe");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, Duration::days(1).num_seconds());
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let codec = codec();
        let token = codec.issue_refresh(Uuid::new_v4()).unwrap();
        let claims = codec.verify_refresh(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, Duration::days(10).num_seconds());
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let codec = codec();
        let user_id = Uuid::new_v4();

        let access = codec.issue_access(user_id, "a@example.com", "a").unwrap();
        let refresh = codec.issue_refresh(user_id).unwrap();

        assert_eq!(codec.verify_refresh(&access), Err(JwtError::InvalidSignature));
        assert_eq!(codec.verify_access(&refresh), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_shared_secret_still_checks_type() {
        let codec = SessionTokenCodec::new(
            TokenSettings::new(ACCESS_SECRET, Duration::days(1)),
            TokenSettings::new(ACCESS_SECRET, Duration::days(10)),
        );

        let refresh = codec.issue_refresh(Uuid::new_v4()).unwrap();
        assert!(codec.verify_access(&refresh).is_err());

        let access = codec.issue_access(Uuid::new_v4(), "a@example.com", "a").unwrap();
        assert_eq!(codec.verify_refresh(&access), Err(JwtError::WrongTokenType));
    }

    #[test]
    fn test_expired_token() {
        let codec = codec_with(Duration::seconds(-3600), Duration::seconds(-3600));

        let access = codec.issue_access(Uuid::new_v4(), "a@example.com", "a").unwrap();
        assert_eq!(codec.verify_access(&access), Err(JwtError::Expired));

        let refresh = codec.issue_refresh(Uuid::new_v4()).unwrap();
        assert_eq!(codec.verify_refresh(&refresh), Err(JwtError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let token = codec()
            .issue_access(Uuid::new_v4(), "a@example.com", "a")
            .unwrap();

        let other = SessionTokenCodec::new(
            TokenSettings::new("another-access-secret-32-bytes-long!", Duration::days(1)),
            TokenSettings::new(REFRESH_SECRET, Duration::days(10)),
        );
        assert_eq!(other.verify_access(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert!(matches!(codec.verify_access("not.a.jwt"), Err(JwtError::Malformed(_))));
        assert!(matches!(codec.verify_access(""), Err(JwtError::Malformed(_))));
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let codec = codec();
        let user_id = Uuid::new_v4();

        assert_ne!(
            codec.issue_refresh(user_id).unwrap(),
            codec.issue_refresh(user_id).unwrap()
        );
    }

    #[test]
    fn test_settings_debug_redacts_secret() {
        let settings = TokenSettings::new(ACCESS_SECRET, Duration::days(1));
        assert!(!format!("{:?}", settings).contains(ACCESS_SECRET));
    }
}
