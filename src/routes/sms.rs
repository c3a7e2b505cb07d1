use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::sms::*, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_sms))
        .route("/credits", get(check_credits_query).post(check_credits_body))
}
