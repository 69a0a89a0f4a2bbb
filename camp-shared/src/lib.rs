//! # Project Camp Shared Library
//!
//! Domain types, persistence and the authentication core used by the
//! Project Camp API server.
//!
//! ## Module Organization
//!
//! - `models`: database rows and their queries
//! - `store`: storage traits with PostgreSQL and in-memory backends
//! - `auth`: credentials, token lifecycle and project authorization
//! - `mail`: outbound email
//! - `db`: connection pool and migrations

pub mod auth;
pub mod db;
pub mod mail;
pub mod models;
pub mod store;

/// Current version of the Project Camp shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
