// src/models/auth.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record from the service's users collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    // Hidden by the service unless emailVisibility is set
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordAuthRequest<'a> {
    pub identity: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: User,
}

/// Body for creating a new account.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(rename = "emailVisibility")]
    pub email_visibility: bool,
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

/// Error payload returned by the service for any non-2xx response.
///
/// `data` maps field names to `{code, message}` objects and keeps the order the
/// service sent them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ServiceErrorBody {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn with_field_error(mut self, field: &str, code: &str, message: &str) -> Self {
        self.data.insert(
            field.to_string(),
            serde_json::json!({ "code": code, "message": message }),
        );
        self
    }

    /// Message of the first field-level validation error, if any.
    pub fn first_field_message(&self) -> Option<&str> {
        self.data
            .values()
            .filter_map(|field| field.get("message").and_then(Value::as_str))
            .find(|message| !message.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_name() {
        let mut user = User {
            id: "u1".to_string(),
            username: "jdoe".to_string(),
            email: String::new(),
            name: "Jane Doe".to_string(),
        };
        assert_eq!(user.display_name(), "Jane Doe");

        user.name = "  ".to_string();
        assert_eq!(user.display_name(), "jdoe");
    }

    #[test]
    fn test_first_field_message_keeps_response_order() {
        let body: ServiceErrorBody = serde_json::from_str(
            r#"{
                "code": 400,
                "message": "Failed to create record.",
                "data": {
                    "username": {"code": "validation_not_unique", "message": "The username is invalid or already in use."},
                    "email": {"code": "validation_required", "message": "Cannot be blank."}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            body.first_field_message(),
            Some("The username is invalid or already in use.")
        );
    }

    #[test]
    fn test_first_field_message_empty_data() {
        let body: ServiceErrorBody =
            serde_json::from_str(r#"{"code": 400, "message": "Failed to authenticate.", "data": {}}"#)
                .unwrap();
        assert_eq!(body.first_field_message(), None);
    }
}
