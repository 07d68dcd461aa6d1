//! User request and response types.
//!
//! The credential secret is accepted on signup and on update but is never
//! echoed back.

use serde::{Deserialize, Serialize};

/// Request body for `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUser {
    pub email: String,
    pub name: String,
    pub address: String,
    pub password: String,
}

/// Request body for `PATCH /users/{id}`.
///
/// Absent fields are left untouched. Changing `password` emits a
/// credential-change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_user_partial() {
        let patch: PatchUser = serde_json::from_str(r#"{"password":"hunter2"}"#).unwrap();
        assert_eq!(patch.password.as_deref(), Some("hunter2"));
        assert!(patch.name.is_none());
        assert!(patch.address.is_none());
    }

    #[test]
    fn test_user_response_omits_password() {
        let response = UserResponse {
            user_id: 7,
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            address: "1 Analytical Way".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userId"], 7);
        assert!(json.get("password").is_none());
    }
}
