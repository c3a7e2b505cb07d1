use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(rename = "_id")]
    pub email: String,

    pub password_hash: String,

    // absent means active; only an explicit false disables the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl Admin {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub email: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::Admin;

    #[test]
    fn admin_is_active_unless_explicitly_disabled() {
        let mut admin = Admin {
            email: "admin@x.com".to_string(),
            password_hash: String::new(),
            active: None,
            role: None,
            last_login: None,
        };
        assert!(admin.is_active());

        admin.active = Some(true);
        assert!(admin.is_active());

        admin.active = Some(false);
        assert!(!admin.is_active());
    }
}
