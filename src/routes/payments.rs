use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::payments::*, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submit", post(submit_payment))
        .route("/approve", post(approve_payment))
        .route("/reject", post(reject_payment))
        .route("/delete", post(delete_payment))
        .route("/pending", get(get_pending_payments))
        .route("/user", get(get_user_payments))
}
