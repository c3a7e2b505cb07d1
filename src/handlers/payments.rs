use axum::{
    extract::{Query, State},
    response::Json,
};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    ledger,
    models::money::Money,
    models::payment::{Payment, PaymentActionRequest, PaymentQuery, PaymentResponse, PaymentStatus, SubmitPaymentRequest},
    services::telegram,
    state::AppState,
};

use super::admin::ensure_admin;

// Submit a payment for review; credits are only granted on admin approval
pub async fn submit_payment(
    State(state): State<AppState>,
    Json(payload): Json<SubmitPaymentRequest>,
) -> Result<Json<Value>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let txid = payload.txid.trim();
    if txid.is_empty() {
        return Err(AppError::invalid_data("txid is required"));
    }

    let amount = Money::from_f64(payload.amount)?;
    let payment_id = ledger::submit_payment(
        &state.db,
        &payload.email,
        amount,
        txid,
        payload.currency.clone(),
    )
    .await?;

    tracing::info!(
        "payment {} submitted by {} for ${}",
        payment_id.to_hex(),
        payload.email,
        amount
    );

    if let Some(tg) = &state.telegram {
        let (text, buttons) = telegram::payment_alert(
            &payload.email,
            &amount.to_string(),
            txid,
            &payment_id.to_hex(),
        );
        tg.spawn_notify(text, Some(buttons));
    }

    Ok(Json(json!({
        "success": true,
        "paymentId": payment_id.to_hex(),
        "message": "Payment submitted for review",
    })))
}

// Approve a pending payment and atomically apply its credits
pub async fn approve_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentActionRequest>,
) -> Result<Json<Value>> {
    let admin_email = payload.admin_email.as_deref().ok_or(AppError::Unauthorized)?;
    ensure_admin(&state.db, admin_email).await?;

    let payment_id = ObjectId::parse_str(&payload.payment_id)?;
    let outcome = ledger::approve_payment(&state.db, payment_id, admin_email).await?;

    tracing::info!(
        "approved payment {} for {}: +{} credits",
        payload.payment_id,
        outcome.email,
        outcome.credits_added
    );

    if let Some(tg) = &state.telegram {
        let text = telegram::approval_alert(
            &outcome.email,
            &outcome.amount.to_string(),
            outcome.credits_added,
        );
        tg.spawn_notify(text, None);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Payment approved and credits added",
        "email": outcome.email,
        "creditsAdded": outcome.credits_added,
    })))
}

// Reject a pending payment; no credit side effect
pub async fn reject_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentActionRequest>,
) -> Result<Json<Value>> {
    let admin_email = payload.admin_email.as_deref().unwrap_or("admin");

    let payment_id = ObjectId::parse_str(&payload.payment_id)?;
    let outcome = ledger::reject_payment(&state.db, payment_id, admin_email).await?;

    tracing::info!("rejected payment {} for {}", payload.payment_id, outcome.email);

    if let Some(tg) = &state.telegram {
        let text = telegram::rejection_alert(&outcome.email, &outcome.amount.to_string());
        tg.spawn_notify(text, None);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Payment rejected",
    })))
}

// Remove a payment record regardless of status; never reverses credits
pub async fn delete_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentActionRequest>,
) -> Result<Json<Value>> {
    let payment_id = ObjectId::parse_str(&payload.payment_id)?;
    ledger::delete_payment(&state.db, payment_id).await?;

    tracing::info!("deleted payment {}", payload.payment_id);

    Ok(Json(json!({
        "success": true,
        "message": "Payment deleted",
    })))
}

// List payments awaiting a decision, newest first
pub async fn get_pending_payments(State(state): State<AppState>) -> Result<Json<Value>> {
    let collection: Collection<Payment> = state.db.collection(ledger::PAYMENTS);

    let cursor = collection
        .find(doc! { "status": PaymentStatus::Pending.as_str() })
        .await?;
    let mut payments: Vec<Payment> = cursor.try_collect().await?;

    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let responses: Vec<PaymentResponse> = payments.into_iter().map(PaymentResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": responses.len(),
        "payments": responses,
    })))
}

// Full payment history for one user, newest first
pub async fn get_user_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Value>> {
    let email = query
        .email
        .as_deref()
        .ok_or_else(|| AppError::invalid_data("email is required"))?;

    let collection: Collection<Payment> = state.db.collection(ledger::PAYMENTS);

    let cursor = collection.find(doc! { "email": email }).await?;
    let mut payments: Vec<Payment> = cursor.try_collect().await?;

    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let responses: Vec<PaymentResponse> = payments.into_iter().map(PaymentResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": responses.len(),
        "payments": responses,
    })))
}
