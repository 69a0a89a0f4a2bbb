/// Database layer
///
/// - `pool`: PostgreSQL connection pool with a connectivity check
/// - `migrations`: embedded sqlx migrations and status reporting
///
/// Row types and their queries live in [`crate::models`]; the store traits
/// in [`crate::store`] are what the rest of the crate depends on.

pub mod migrations;
pub mod pool;
