use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    ledger,
    models::sms_log::SmsLog,
    state::AppState,
};

const DEFAULT_CUSTOM_MESSAGE: &str =
    "Your tickets are ready for transfer and will be activated upon acceptance";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub recipient_phone: String,
    pub recipient_name: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub event_title: String,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_venue: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub row: Option<String>,
    #[serde(default)]
    pub seats: Option<String>,
    #[serde(default)]
    pub ticket_count: Option<u32>,
    #[serde(default)]
    pub seat_type: Option<String>,
    #[serde(default)]
    pub custom_message: Option<String>,
    #[validate(email)]
    pub user_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsQuery {
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsBody {
    pub user_email: String,
}

// Send one SMS: gate on balance, deliver through the provider chain, then
// commit the debit. The debit only happens after the gateway accepts the
// message; a failed send costs nothing.
pub async fn send_sms(
    State(state): State<AppState>,
    Json(payload): Json<SendSmsRequest>,
) -> Result<Json<Value>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let phone = normalize_phone(&payload.recipient_phone)
        .ok_or_else(|| AppError::invalid_data("Invalid phone number format"))?;

    let credit_check = ledger::check_credits(&state.db, &payload.user_email).await?;
    if !credit_check.has_credits {
        return Err(AppError::InsufficientCredits {
            remaining: credit_check.credits_remaining,
        });
    }

    let message = compose_sms_message(&payload);
    let sent = state.sms_gateway.send(&phone, &message).await?;

    // The message is out; a deduction failure here is an accepted
    // inconsistency. Log it and report the pre-send balance minus one.
    let remaining = match ledger::deduct_credit(&state.db, &payload.user_email).await {
        Ok(remaining) => remaining,
        Err(e) => {
            tracing::error!(
                "credit deduction failed after successful send for {}: {}",
                payload.user_email,
                e
            );
            credit_check.credits_remaining - 1
        }
    };

    let now = Utc::now();
    let log = SmsLog {
        id: None,
        user_email: payload.user_email.clone(),
        recipient_phone: phone.clone(),
        recipient_name: payload.recipient_name.clone(),
        event_title: payload.event_title.clone(),
        status: "sent".to_string(),
        provider: sent.provider.to_string(),
        timestamp: now,
        created_at: now,
    };
    if let Err(e) = ledger::log_sms_activity(&state.db, log).await {
        tracing::warn!("failed to log SMS activity: {}", e);
    }

    Ok(Json(json!({
        "success": true,
        "message": "SMS sent successfully",
        "data": {
            "recipientPhone": phone,
            "messageId": sent.message_id,
            "provider": sent.provider,
            "creditsRemaining": remaining,
        },
    })))
}

pub async fn check_credits_query(
    State(state): State<AppState>,
    Query(query): Query<CreditsQuery>,
) -> Result<Json<Value>> {
    let email = query
        .user_email
        .as_deref()
        .ok_or_else(|| AppError::invalid_data("Missing required parameter: userEmail"))?;
    credits_response(&state, email).await
}

pub async fn check_credits_body(
    State(state): State<AppState>,
    Json(body): Json<CreditsBody>,
) -> Result<Json<Value>> {
    credits_response(&state, &body.user_email).await
}

async fn credits_response(state: &AppState, email: &str) -> Result<Json<Value>> {
    let status = ledger::check_credits(&state.db, email).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "userEmail": email,
            "smsCredits": status.credits_remaining,
            "hasCredits": status.has_credits,
            "subscriptionStatus": status.subscription_status,
            "totalSent": status.total_sent,
            "thisMonthSent": status.this_month_sent,
        },
    })))
}

/// Strips whitespace and keeps digits with an optional leading `+`. Rejects
/// anything with other characters, leading zeros, or out-of-range length.
fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return None;
    }

    Some(cleaned)
}

fn compose_sms_message(request: &SendSmsRequest) -> String {
    let mut message = format!("🎫 {}, you have tickets!\n\n", request.recipient_name);

    if let Some(sender) = &request.sender_name {
        message.push_str(&format!("From: {}\n", sender));
    }
    message.push_str(&format!("Event: {}\n", request.event_title));

    if let Some(date) = &request.event_date {
        message.push_str(&format!("Date: {}\n", date));
    }
    if let Some(venue) = &request.event_venue {
        message.push_str(&format!("Venue: {}\n", venue));
    }

    if let Some(section) = &request.section {
        message.push_str(&format!("Section: {}", section));
        if let Some(row) = &request.row {
            message.push_str(&format!(", Row: {}", row));
        }
        if let Some(seats) = &request.seats {
            message.push_str(&format!(", Seats: {}", seats));
        }
        message.push('\n');
    }

    if let Some(count) = request.ticket_count {
        message.push_str(&format!("Tickets: {}", count));
        if let Some(seat_type) = &request.seat_type {
            message.push_str(&format!(" ({})", seat_type));
        }
        message.push('\n');
    }

    let custom = request
        .custom_message
        .as_deref()
        .unwrap_or(DEFAULT_CUSTOM_MESSAGE);
    message.push_str(&format!("\n{}\n", custom));

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SendSmsRequest {
        SendSmsRequest {
            recipient_phone: "+1 555 000 1234".to_string(),
            recipient_name: "Jordan".to_string(),
            sender_name: Some("Sam".to_string()),
            event_title: "The Concert".to_string(),
            event_date: Some("2026-09-01".to_string()),
            event_venue: None,
            section: Some("102".to_string()),
            row: Some("F".to_string()),
            seats: None,
            ticket_count: Some(2),
            seat_type: None,
            custom_message: None,
            user_email: "a@x.com".to_string(),
        }
    }

    #[test]
    fn normalize_phone_accepts_international_format() {
        assert_eq!(
            normalize_phone("+1 555 000 1234").as_deref(),
            Some("+15550001234")
        );
        assert_eq!(normalize_phone("15550001234").as_deref(), Some("15550001234"));
    }

    #[test]
    fn normalize_phone_rejects_garbage() {
        assert!(normalize_phone("").is_none());
        assert!(normalize_phone("abc").is_none());
        assert!(normalize_phone("+1-555-000").is_none());
        assert!(normalize_phone("0123456").is_none());
        assert!(normalize_phone("+12345678901234567").is_none());
    }

    #[test]
    fn message_includes_seating_and_default_footer() {
        let message = compose_sms_message(&request());

        assert!(message.contains("Jordan, you have tickets!"));
        assert!(message.contains("From: Sam"));
        assert!(message.contains("Event: The Concert"));
        assert!(message.contains("Section: 102, Row: F\n"));
        assert!(message.contains("Tickets: 2"));
        assert!(message.contains(DEFAULT_CUSTOM_MESSAGE));
    }

    #[test]
    fn custom_message_overrides_footer() {
        let mut req = request();
        req.custom_message = Some("See you there".to_string());

        let message = compose_sms_message(&req);
        assert!(message.contains("See you there"));
        assert!(!message.contains(DEFAULT_CUSTOM_MESSAGE));
    }
}
