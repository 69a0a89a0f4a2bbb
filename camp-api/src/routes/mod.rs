/// API route handlers, organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, sessions, email verification, password reset
/// - `projects`: Project CRUD and listing
/// - `members`: Project membership and roles
/// - `tasks`: Tasks and subtasks
/// - `notes`: Project notes
/// - `files`: Project file metadata
///
/// Project-scoped handlers take raw path ids and let
/// [`ResourceScope`](camp_shared::auth::authorization::ResourceScope) parse
/// them, so a malformed id is a 400 rather than a routing failure.

use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};

pub mod auth;
pub mod files;
pub mod health;
pub mod members;
pub mod notes;
pub mod projects;
pub mod tasks;

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Trims a text field so length checks see what will be stored
pub fn trim_field(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trims an optional text field
pub fn trim_optional(value: &mut Option<String>) {
    if let Some(v) = value.as_mut() {
        trim_field(v);
    }
}

/// Deserializes a field where `null` differs from absent
///
/// Pair with `#[serde(default)]`: an absent field stays `None`, an explicit
/// `null` becomes `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let null: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(null.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note":"x"}"#).unwrap();
        assert_eq!(set.note, Some(Some("x".to_string())));
    }

    #[test]
    fn test_trim_field() {
        let mut value = "  Launch  ".to_string();
        trim_field(&mut value);
        assert_eq!(value, "Launch");

        let mut blank = Some("   ".to_string());
        trim_optional(&mut blank);
        assert_eq!(blank.as_deref(), Some(""));
    }
}
