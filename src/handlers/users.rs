use axum::{
    extract::{Query, State},
    response::Json,
};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    Collection,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    ledger,
    models::user::{User, UserResponse},
    state::AppState,
};

use super::admin::ensure_admin;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserEmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEmailQuery {
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetMonthRequest {
    pub user_email: String,
    #[serde(default)]
    pub admin_email: Option<String>,
}

// Upsert with merge semantics: registration never clobbers fields a payment
// approval has already written (balance, subscription, counters).
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<Value>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let users: Collection<User> = state.db.collection(ledger::USERS);
    let now = to_bson(&chrono::Utc::now())?;

    let mut set = doc! { "lastUpdated": now.clone() };
    if let Some(first_name) = &payload.first_name {
        set.insert("firstName", first_name);
    }
    if let Some(last_name) = &payload.last_name {
        set.insert("lastName", last_name);
    }
    if let Some(phone) = &payload.phone {
        set.insert("phone", phone);
    }

    users
        .update_one(
            doc! { "_id": &payload.email },
            doc! {
                "$set": set,
                "$setOnInsert": {
                    "createdAt": now,
                    "smsCredits": 0_i64,
                    "subscriptionStatus": "inactive",
                    "totalSent": 0_i64,
                    "thisMonthSent": 0_i64,
                },
            },
        )
        .upsert(true)
        .await?;

    tracing::info!("registered user {}", payload.email);

    Ok(Json(json!({ "success": true, "message": "User registered" })))
}

pub async fn validate_user(
    State(state): State<AppState>,
    Json(payload): Json<UserEmailBody>,
) -> Result<Json<Value>> {
    let users: Collection<User> = state.db.collection(ledger::USERS);
    let exists = users
        .find_one(doc! { "_id": &payload.email })
        .await?
        .is_some();

    Ok(Json(json!({ "success": true, "valid": exists })))
}

pub async fn get_user_data(
    State(state): State<AppState>,
    Query(query): Query<UserEmailQuery>,
) -> Result<Json<Value>> {
    let email = query
        .user_email
        .as_deref()
        .ok_or_else(|| AppError::invalid_data("userEmail is required"))?;

    let users: Collection<User> = state.db.collection(ledger::USERS);
    let user = users
        .find_one(doc! { "_id": email })
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

pub async fn get_all_users(State(state): State<AppState>) -> Result<Json<Value>> {
    let users: Collection<User> = state.db.collection(ledger::USERS);

    let cursor = users.find(doc! {}).await?;
    let mut all: Vec<User> = cursor.try_collect().await?;

    // newest first; fall back to lastUpdated for docs created by merge writes
    all.sort_by(|a, b| {
        let key = |u: &User| u.created_at.or(u.last_updated);
        key(b).cmp(&key(a))
    });

    let responses: Vec<UserResponse> = all.into_iter().map(UserResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "count": responses.len(),
        "users": responses,
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Json(payload): Json<UserEmailBody>,
) -> Result<Json<Value>> {
    let users: Collection<User> = state.db.collection(ledger::USERS);
    let deleted = users.delete_one(doc! { "_id": &payload.email }).await?;

    if deleted.deleted_count == 0 {
        return Err(AppError::UserNotFound);
    }

    tracing::info!("deleted user {}", payload.email);

    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

// Explicit monthly-counter reset; scheduling is an external concern
pub async fn reset_month_counter(
    State(state): State<AppState>,
    Json(payload): Json<ResetMonthRequest>,
) -> Result<Json<Value>> {
    let admin_email = payload.admin_email.as_deref().ok_or(AppError::Unauthorized)?;
    ensure_admin(&state.db, admin_email).await?;

    ledger::reset_month_counter(&state.db, &payload.user_email).await?;

    tracing::info!(
        "{} reset monthly counter for {}",
        admin_email,
        payload.user_email
    );

    Ok(Json(json!({ "success": true, "message": "Monthly counter reset" })))
}
