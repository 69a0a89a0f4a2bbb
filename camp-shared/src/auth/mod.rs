/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: signing and verification of access and refresh tokens
/// - [`temporary_token`]: opaque single-use tokens for email links
/// - [`lifecycle`]: register, login, refresh, logout, verification and reset
/// - [`guard`]: turns a request credential into an authenticated identity
/// - [`authorization`]: per-project role checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **Session Tokens**: HS256 with separate access and refresh secrets
/// - **Refresh Rotation**: only the most recently issued refresh token is accepted
/// - **Link Tokens**: 20 random bytes, stored as a SHA-256 digest with an expiry
///
/// # Example
///
/// ```no_run
/// use camp_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("launch2024")?;
/// assert!(verify_password("launch2024", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod guard;
pub mod jwt;
pub mod lifecycle;
pub mod password;
pub mod temporary_token;
