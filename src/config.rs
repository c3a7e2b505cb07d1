// config.rs
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub port: u16,
    pub host: String,

    // Telegram notification sink (disabled when unset)
    pub telegram_bot_token: Option<String>,
    pub telegram_admin_chat_id: Option<String>,

    // SMS providers, tried in order: Twilio then Textbelt
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub textbelt_api_key: Option<String>,

    // Minimum spacing between outbound SMS. Per-process throttle only:
    // a multi-instance deployment needs an external limiter.
    pub sms_min_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let sms_min_interval_ms = env::var("SMS_MIN_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3000);

        AppConfig {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set as an environment variable"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "sms_credits".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_admin_chat_id: env::var("TELEGRAM_ADMIN_CHAT_ID").ok(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").ok(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").ok(),
            twilio_from_number: env::var("TWILIO_FROM_NUMBER").ok(),
            textbelt_api_key: env::var("TEXTBELT_API_KEY").ok(),
            sms_min_interval: Duration::from_millis(sms_min_interval_ms),
        }
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_admin_chat_id.is_some()
    }
}
