use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name shown when the user record carries no username
const FALLBACK_DISPLAY_NAME: &str = "Admin";

/// Field names owned by the record itself, never stored in `extra`
const RESERVED_FIELDS: [&str; 2] = ["username", "token"];

/// The signed-in staff member, as issued by the backend's login endpoint.
///
/// Only `username` is required. `token` is sent verbatim as the
/// `Authorization` header on API requests. Any other fields the backend
/// returns are kept untouched so the record round-trips through storage;
/// they can only be added through `insert_extra`, which refuses the names of
/// the record's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: None,
            extra: Map::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Fields beyond `username` and `token`
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Add a backend field. Returns false, leaving the record unchanged,
    /// when `key` names one of the record's own fields.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return false;
        }
        self.extra.insert(key, value.into());
        true
    }

    /// Username for display, falling back to "Admin"
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            FALLBACK_DISPLAY_NAME
        } else {
            &self.username
        }
    }

    /// Avatar initial: first letter of the display name, uppercased
    pub fn initial(&self) -> char {
        self.display_name()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('A')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_fields_round_trip() {
        let json = r#"{"username":"siti","token":"abc-123","role":"admin","id":7}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.username, "siti");
        assert_eq!(user.token.as_deref(), Some("abc-123"));
        assert_eq!(user.extra().get("role"), Some(&Value::from("admin")));
        assert!(!user.extra().contains_key("username"));

        let back: UserRecord = serde_json::from_str(&serde_json::to_string(&user).unwrap()).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_missing_username_is_rejected() {
        assert!(serde_json::from_str::<UserRecord>(r#"{"token":"t"}"#).is_err());
        assert!(serde_json::from_str::<UserRecord>("null").is_err());
        assert!(serde_json::from_str::<UserRecord>("[]").is_err());
    }

    #[test]
    fn test_insert_extra_refuses_reserved_fields() {
        let mut user = UserRecord::new("dewi");
        assert!(!user.insert_extra("username", "shadow"));
        assert!(!user.insert_extra("token", "tok"));
        assert!(user.insert_extra("role", "staff"));

        assert_eq!(user.username, "dewi");
        assert_eq!(user.token, None);
        assert_eq!(user.extra().len(), 1);
    }

    #[test]
    fn test_display_name_and_initial() {
        let user = UserRecord::new("budi");
        assert_eq!(user.display_name(), "budi");
        assert_eq!(user.initial(), 'B');

        let unnamed = UserRecord::new("");
        assert_eq!(unnamed.display_name(), "Admin");
        assert_eq!(unnamed.initial(), 'A');
    }
}
