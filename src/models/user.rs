use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounded history kept on the user document, newest first.
pub const RECENT_ACTIVITY_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    #[default]
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub email: String,

    #[serde(default)]
    pub sms_credits: i64,

    #[serde(default)]
    pub subscription_status: SubscriptionStatus,

    #[serde(default)]
    pub total_sent: i64,

    #[serde(default)]
    pub this_month_sent: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_activity: Vec<ActivityEntry>,

    // Profile fields supplied at registration, merged, never required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub email: String,
    pub sms_credits: i64,
    pub subscription_status: SubscriptionStatus,
    pub total_sent: i64,
    pub this_month_sent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub recent_activity: Vec<ActivityEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            email: user.email,
            sms_credits: user.sms_credits,
            subscription_status: user.subscription_status,
            total_sent: user.total_sent,
            this_month_sent: user.this_month_sent,
            last_used: user.last_used,
            last_payment_date: user.last_payment_date,
            created_at: user.created_at,
            recent_activity: user.recent_activity,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_counters_default_to_zero() {
        let user: User = serde_json::from_str(r#"{"_id": "a@x.com"}"#).unwrap();
        assert_eq!(user.sms_credits, 0);
        assert_eq!(user.total_sent, 0);
        assert_eq!(user.subscription_status, SubscriptionStatus::Inactive);
        assert!(user.recent_activity.is_empty());
    }
}
