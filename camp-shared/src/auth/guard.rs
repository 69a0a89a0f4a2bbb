/// Authentication guard
///
/// Turns the credential on an incoming request into an [`Identity`]:
///
/// 1. Take the token from `Authorization: Bearer <token>`, or failing that
///    from the `accessToken` cookie.
/// 2. Verify it as an access token.
/// 3. Load the user named by its `sub` claim, without any credential
///    columns.
///
/// Any failure in step 2 is reported as one undifferentiated
/// [`AuthError::InvalidCredential`]; the underlying [`JwtError`] is kept
/// only for logging.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use camp_shared::auth::guard::Authenticator;
///
/// # async fn example(authenticator: Authenticator, headers: HeaderMap) {
/// match authenticator.authenticate(&headers).await {
///     Ok(identity) => println!("hello {}", identity.username),
///     Err(e) => println!("rejected: {}", e),
/// }
/// # }
/// ```

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::debug;

use super::jwt::{JwtError, SessionTokenCodec};
use crate::models::user::UserProfile;
use crate::store::{StoreError, UserStore};

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// The authenticated caller as seen by handlers
///
/// A projection of the user row with no password hash, refresh token or
/// token digests.
pub type Identity = UserProfile;

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Neither a bearer header nor an access token cookie was present
    #[error("Unauthorized request")]
    MissingCredential,

    /// The token failed verification
    #[error("Invalid access token")]
    InvalidCredential(#[source] JwtError),

    /// The token verified but its user no longer exists
    #[error("Invalid access token")]
    IdentityNotFound,

    /// The user lookup failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Extracts the raw access token from a request's headers
///
/// The bearer header wins over the cookie. A header with another scheme is
/// ignored rather than rejected.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verifies request credentials against the user store
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    codec: SessionTokenCodec,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>, codec: SessionTokenCodec) -> Self {
        Self { users, codec }
    }

    /// Authenticates a request from its headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = extract_credential(headers).ok_or(AuthError::MissingCredential)?;
        self.authenticate_token(&token).await
    }

    /// Authenticates a raw access token
    pub async fn authenticate_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.codec.verify_access(token).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            AuthError::InvalidCredential(e)
        })?;

        let identity = self.users.find_profile(claims.sub).await?.ok_or_else(|| {
            debug!(user_id = %claims.sub, "Access token names an unknown user");
            AuthError::IdentityNotFound
        })?;

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenSettings;
    use crate::models::user::CreateUser;
    use crate::store::memory::MemoryStore;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use uuid::Uuid;

    fn codec() -> SessionTokenCodec {
        SessionTokenCodec::new(
            TokenSettings::new("access-secret-key-at-least-32-bytes", Duration::days(1)),
            TokenSettings::new("refresh-secret-key-at-least-32-bytes", Duration::days(10)),
        )
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_prefers_bearer() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "accessToken=from-cookie"),
        ]);
        assert_eq!(extract_credential(&map).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_extract_falls_back_to_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Basic dXNlcjpwYXNz"),
            (header::COOKIE, "theme=dark; accessToken=from-cookie"),
        ]);
        assert_eq!(extract_credential(&map).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
        let map = headers(&[(header::AUTHORIZATION, "Bearer   ")]);
        assert_eq!(extract_credential(&map), None);
    }

    #[tokio::test]
    async fn test_authenticate_outcomes() {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(CreateUser {
                username: "jdoe".to_string(),
                email: "jdoe@example.com".to_string(),
                full_name: None,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let codec = codec();
        let authenticator = Authenticator::new(store.clone(), codec.clone());

        let token = codec.issue_access(user.id, &user.email, &user.username).unwrap();
        let identity = authenticator
            .authenticate(&headers(&[(header::AUTHORIZATION, &format!("Bearer {token}"))]))
            .await
            .unwrap();
        assert_eq!(identity.id, user.id);

        assert!(matches!(
            authenticator.authenticate(&HeaderMap::new()).await,
            Err(AuthError::MissingCredential)
        ));

        assert!(matches!(
            authenticator.authenticate_token("garbage").await,
            Err(AuthError::InvalidCredential(_))
        ));

        let refresh = codec.issue_refresh(user.id).unwrap();
        assert!(matches!(
            authenticator.authenticate_token(&refresh).await,
            Err(AuthError::InvalidCredential(_))
        ));

        let ghost = codec
            .issue_access(Uuid::new_v4(), "ghost@example.com", "ghost")
            .unwrap();
        assert!(matches!(
            authenticator.authenticate_token(&ghost).await,
            Err(AuthError::IdentityNotFound)
        ));
    }
}
