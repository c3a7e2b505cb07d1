use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod errors;
mod handlers;
mod ledger;
mod models;
mod routes;
mod services;
mod state;

use config::AppConfig;
use database::connection::get_db_client;
use services::sms_gateway::SmsGateway;
use services::telegram::TelegramService;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    let db = get_db_client(&config).await;
    let app_state = initialize_app_state(db, &config);

    let app = build_router(app_state);
    start_server(app, &config).await;
}

fn initialize_app_state(db: mongodb::Database, config: &AppConfig) -> AppState {
    let sms_gateway = Arc::new(SmsGateway::from_config(config));
    match sms_gateway.provider_count() {
        0 => tracing::warn!("⚠️ No SMS providers configured, sends will fail"),
        n => tracing::info!("✅ SMS gateway initialized with {} provider(s)", n),
    }

    let mut app_state = AppState::new(db, sms_gateway);

    if config.telegram_configured() {
        // telegram_configured() guarantees both values are present
        let token = config.telegram_bot_token.clone().unwrap_or_default();
        let chat_id = config.telegram_admin_chat_id.clone().unwrap_or_default();
        app_state = app_state.with_telegram(Arc::new(TelegramService::new(token, chat_id)));
        tracing::info!("✅ Telegram notifications enabled");
    } else {
        tracing::warn!("Telegram notifications disabled (missing token or chat id)");
    }

    app_state
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/payments", routes::payments::routes())
        .nest("/api/sms", routes::sms::routes())
        .nest("/api/users", routes::users::routes())
        .nest("/api/admin", routes::admin::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.port)));

    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "📨 SMS Credits API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "smsProviders": state.sms_gateway.provider_count(),
        "telegram": state.telegram.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
