use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::money::Money;

/// Payment lifecycle: pending is the only non-terminal state. Approved and
/// rejected payments never transition again; they can only be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    /// Only a pending payment may be approved.
    pub fn ensure_approvable(self) -> Result<()> {
        match self {
            PaymentStatus::Pending => Ok(()),
            PaymentStatus::Approved => Err(AppError::AlreadyApproved),
            PaymentStatus::Rejected => Err(AppError::AlreadyRejected),
        }
    }

    /// Only a pending payment may be rejected.
    pub fn ensure_rejectable(self) -> Result<()> {
        match self {
            PaymentStatus::Pending => Ok(()),
            PaymentStatus::Approved => Err(AppError::CannotRejectApproved),
            PaymentStatus::Rejected => Err(AppError::AlreadyRejected),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub email: String,
    pub amount: Money,
    pub txid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    pub status: PaymentStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
}

impl Payment {
    pub fn new(email: &str, amount: Money, txid: &str, currency: Option<String>) -> Self {
        let now = Utc::now();
        Payment {
            id: Some(ObjectId::new()),
            email: email.to_string(),
            amount,
            txid: txid.to_string(),
            currency,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    #[validate(email)]
    pub email: String,
    pub amount: f64,
    pub txid: String,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentActionRequest {
    pub payment_id: String,
    #[serde(default)]
    pub admin_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub email: String,
    pub amount: String,
    pub txid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        PaymentResponse {
            id: payment.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: payment.email,
            amount: payment.amount.to_string(),
            txid: payment.txid,
            currency: payment.currency,
            status: payment.status.as_str(),
            created_at: payment.created_at,
            approved_at: payment.approved_at,
            approved_by: payment.approved_by,
            rejected_at: payment.rejected_at,
            rejected_by: payment.rejected_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_payment_can_be_approved_or_rejected() {
        assert!(PaymentStatus::Pending.ensure_approvable().is_ok());
        assert!(PaymentStatus::Pending.ensure_rejectable().is_ok());
    }

    #[test]
    fn approved_is_terminal() {
        assert!(matches!(
            PaymentStatus::Approved.ensure_approvable(),
            Err(AppError::AlreadyApproved)
        ));
        assert!(matches!(
            PaymentStatus::Approved.ensure_rejectable(),
            Err(AppError::CannotRejectApproved)
        ));
    }

    #[test]
    fn rejected_is_terminal() {
        assert!(matches!(
            PaymentStatus::Rejected.ensure_approvable(),
            Err(AppError::AlreadyRejected)
        ));
        assert!(matches!(
            PaymentStatus::Rejected.ensure_rejectable(),
            Err(AppError::AlreadyRejected)
        ));
    }

    #[test]
    fn new_payments_start_pending_with_no_decision_stamps() {
        let payment = Payment::new("a@x.com", Money::from_f64(20.0).unwrap(), "tx1", None);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.id.is_some());
        assert!(payment.approved_at.is_none());
        assert!(payment.approved_by.is_none());
        assert!(payment.rejected_at.is_none());
    }

    #[test]
    fn status_round_trips_through_serde() {
        let json = serde_json::to_string(&PaymentStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let status: PaymentStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(status, PaymentStatus::Approved);
    }
}
