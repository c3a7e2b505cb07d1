use axum::{
    extract::{Query, State},
    response::Json,
};
use mongodb::{
    bson::{doc, to_bson},
    Collection, Database,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    errors::{AppError, Result},
    ledger,
    models::admin::{Admin, AdminLoginRequest, AdminResponse},
    state::AppState,
};

/// Gate for credit-granting operations. An unknown or deactivated account is
/// rejected before any ledger mutation is attempted.
pub async fn ensure_admin(db: &Database, admin_email: &str) -> Result<()> {
    let admins: Collection<Admin> = db.collection(ledger::ADMINS);
    let admin = admins.find_one(doc! { "_id": admin_email }).await?;

    match admin {
        Some(admin) if admin.is_active() => Ok(()),
        Some(_) => {
            tracing::warn!("deactivated admin attempted access: {}", admin_email);
            Err(AppError::Forbidden)
        }
        None => {
            tracing::warn!("unauthorized admin access attempt: {}", admin_email);
            Err(AppError::Forbidden)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckQuery {
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckBody {
    pub user_email: String,
}

pub async fn check_admin_query(
    State(state): State<AppState>,
    Query(query): Query<AdminCheckQuery>,
) -> Result<Json<Value>> {
    let email = query
        .user_email
        .as_deref()
        .ok_or_else(|| AppError::invalid_data("userEmail is required"))?;
    check_admin_response(&state, email).await
}

pub async fn check_admin_body(
    State(state): State<AppState>,
    Json(body): Json<AdminCheckBody>,
) -> Result<Json<Value>> {
    check_admin_response(&state, &body.user_email).await
}

async fn check_admin_response(state: &AppState, email: &str) -> Result<Json<Value>> {
    let admins: Collection<Admin> = state.db.collection(ledger::ADMINS);
    let is_admin = admins
        .find_one(doc! { "_id": email })
        .await?
        .map(|admin| admin.is_active())
        .unwrap_or(false);

    Ok(Json(json!({ "success": true, "isAdmin": is_admin })))
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<Value>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let admins: Collection<Admin> = state.db.collection(ledger::ADMINS);
    let admin = admins
        .find_one(doc! { "_id": &payload.email })
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !admin.is_active() {
        return Err(AppError::AccountInactive);
    }

    let verified = bcrypt::verify(&payload.password, &admin.password_hash)
        .map_err(|e| AppError::service(format!("password verification failed: {}", e)))?;
    if !verified {
        return Err(AppError::InvalidCredentials);
    }

    admins
        .update_one(
            doc! { "_id": &payload.email },
            doc! { "$set": { "lastLogin": to_bson(&chrono::Utc::now())? } },
        )
        .await?;

    tracing::info!("admin login: {}", payload.email);

    Ok(Json(json!({
        "success": true,
        "admin": AdminResponse {
            email: admin.email,
            role: admin.role.unwrap_or_else(|| "admin".to_string()),
        },
    })))
}
