/// Configuration management for the API server
///
/// Configuration is read from environment variables, with a `.env` file
/// loaded first when present.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET`: JWT signing secrets,
///   at least 32 characters each (required)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `ACCESS_TOKEN_EXPIRY_SECS`: Access token lifetime (default: 1 day)
/// - `REFRESH_TOKEN_EXPIRY_SECS`: Refresh token lifetime (default: 10 days)
/// - `TEMPORARY_TOKEN_EXPIRY_SECS`: Verification/reset link lifetime (default: 20 minutes)
/// - `COOKIE_SECURE`: Secure flag on auth cookies (default: true)
/// - `AUTH_REVOKE_REFRESH_ON_LOGOUT`: Clear the stored refresh token on logout (default: false)
/// - `VERIFY_EMAIL_REDIRECT_URL`: Base URL of verification links
/// - `FORGOT_PASSWORD_REDIRECT_URL`: Base URL of reset links
/// - `SMTP_HOST`: SMTP relay; when unset, mail is only logged
/// - `SMTP_PORT`: Relay port (default: 587)
/// - `SMTP_USERNAME` / `SMTP_PASSWORD`: Relay credentials (optional)
/// - `SMTP_TLS`: STARTTLS, or implicit TLS on port 465 (default: true)
/// - `MAIL_FROM`: Sender mailbox (default: Project Camp <no-reply@projectcamp.local>)
/// - `LOG_FORMAT`: `json` for JSON logs (read in `main`)
///
/// # Example
///
/// ```no_run
/// use camp_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use camp_shared::mail::SmtpSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Minimum length of each JWT secret
pub const MIN_SECRET_LENGTH: usize = 32;

const DEFAULT_MAIL_FROM: &str = "Project Camp <no-reply@projectcamp.local>";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub cookies: CookieConfig,
    pub mail: MailConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (adds HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
///
/// Access and refresh tokens are signed with different secrets, so a leaked
/// access secret cannot mint refresh tokens. Generate each with
/// `openssl rand -hex 32`.
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_secret: String,
    pub refresh_ttl_secs: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[redacted]")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_secret", &"[redacted]")
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// Opaque token and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Lifetime of email verification and password reset tokens
    pub temporary_ttl_secs: i64,

    /// Clear the stored refresh token on logout
    pub revoke_refresh_on_logout: bool,
}

/// Auth cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
}

/// Links embedded in outgoing mail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Verification links are `{verify_email_url}/{token}`
    pub verify_email_url: String,

    /// Reset links are `{reset_password_url}/{token}`
    pub reset_password_url: String,

    /// Outbound relay; `None` falls back to logging
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("use_tls", &self.use_tls)
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    fn from_env() -> anyhow::Result<Option<Self>> {
        let host = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => return Ok(None),
        };

        Ok(Some(Self {
            host,
            port: var_or("SMTP_PORT", 587u16)?,
            username: env::var("SMTP_USERNAME").ok().filter(|u| !u.is_empty()),
            password: env::var("SMTP_PASSWORD").ok().filter(|p| !p.is_empty()),
            use_tls: var_or("SMTP_TLS", true)?,
            from: env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string()),
        }))
    }

    pub fn settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            use_tls: self.use_tls,
            from: self.from.clone(),
        }
    }
}

impl MailConfig {
    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/{}", self.verify_email_url.trim_end_matches('/'), token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/{}", self.reset_password_url.trim_end_matches('/'), token)
    }
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    let secret = env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable is required", name))?;

    if secret.len() < MIN_SECRET_LENGTH {
        anyhow::bail!("{} must be at least {} characters long", name, MIN_SECRET_LENGTH);
    }

    Ok(secret)
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - A secret is shorter than 32 characters
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = var_or("API_PORT", 8080u16)?;
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let production = var_or("PRODUCTION", false)?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt = JwtConfig {
            access_secret: required_secret("ACCESS_TOKEN_SECRET")?,
            access_ttl_secs: var_or("ACCESS_TOKEN_EXPIRY_SECS", 24 * 60 * 60)?,
            refresh_secret: required_secret("REFRESH_TOKEN_SECRET")?,
            refresh_ttl_secs: var_or("REFRESH_TOKEN_EXPIRY_SECS", 10 * 24 * 60 * 60)?,
        };

        if jwt.access_secret == jwt.refresh_secret {
            anyhow::bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        let tokens = TokenConfig {
            temporary_ttl_secs: var_or("TEMPORARY_TOKEN_EXPIRY_SECS", 20 * 60)?,
            revoke_refresh_on_logout: var_or("AUTH_REVOKE_REFRESH_ON_LOGOUT", false)?,
        };

        let base_url = format!("http://localhost:{}/api/v1/auth", port);
        let mail = MailConfig {
            verify_email_url: env::var("VERIFY_EMAIL_REDIRECT_URL")
                .unwrap_or_else(|_| format!("{}/verify-email", base_url)),
            reset_password_url: env::var("FORGOT_PASSWORD_REDIRECT_URL")
                .unwrap_or_else(|_| format!("{}/reset-password", base_url)),
            smtp: SmtpConfig::from_env()?,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt,
            tokens,
            cookies: CookieConfig {
                secure: var_or("COOKIE_SECURE", true)?,
            },
            mail,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Configuration for tests and local tooling; no environment involved
    pub fn for_tests() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/camp_test".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                access_secret: "test-access-secret-at-least-32-bytes".to_string(),
                access_ttl_secs: 24 * 60 * 60,
                refresh_secret: "test-refresh-secret-at-least-32-bytes".to_string(),
                refresh_ttl_secs: 10 * 24 * 60 * 60,
            },
            tokens: TokenConfig {
                temporary_ttl_secs: 20 * 60,
                revoke_refresh_on_logout: false,
            },
            cookies: CookieConfig { secure: false },
            mail: MailConfig {
                verify_email_url: "http://camp.test/verify-email".to_string(),
                reset_password_url: "http://camp.test/reset-password".to_string(),
                smtp: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(Config::for_tests().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_links_join_token() {
        let mail = MailConfig {
            verify_email_url: "https://camp.example.com/verify/".to_string(),
            reset_password_url: "https://camp.example.com/reset".to_string(),
            smtp: None,
        };
        assert_eq!(mail.verification_link("abc"), "https://camp.example.com/verify/abc");
        assert_eq!(mail.reset_link("abc"), "https://camp.example.com/reset/abc");
    }

    #[test]
    fn test_smtp_settings_carry_over() {
        let smtp = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: Some("camp".to_string()),
            password: Some("relay-password".to_string()),
            use_tls: true,
            from: DEFAULT_MAIL_FROM.to_string(),
        };

        let settings = smtp.settings();
        assert_eq!(settings.host, "smtp.example.com");
        assert_eq!(settings.port, 465);
        assert_eq!(settings.from, DEFAULT_MAIL_FROM);
        assert!(!format!("{:?}", smtp).contains("relay-password"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Config::for_tests().jwt);
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("test-access-secret"));
    }
}
