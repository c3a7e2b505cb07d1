use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One row in the global `sms_logs` audit collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub user_email: String,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub event_title: String,
    pub status: String,
    pub provider: String,

    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
