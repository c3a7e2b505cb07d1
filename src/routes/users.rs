use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::users::*, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/validate", post(validate_user))
        .route("/data", get(get_user_data))
        .route("/all", get(get_all_users))
        .route("/delete", post(delete_user))
        .route("/reset-month", post(reset_month_counter))
}
