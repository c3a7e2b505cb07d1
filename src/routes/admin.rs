use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::admin::*, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/check", get(check_admin_query).post(check_admin_body))
        .route("/login", post(admin_login))
}
