use mongodb::Database;
use std::sync::Arc;

use crate::services::sms_gateway::SmsGateway;
use crate::services::telegram::TelegramService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sms_gateway: Arc<SmsGateway>,
    pub telegram: Option<Arc<TelegramService>>,
}

impl AppState {
    pub fn new(db: Database, sms_gateway: Arc<SmsGateway>) -> Self {
        AppState {
            db,
            sms_gateway,
            telegram: None,
        }
    }

    pub fn with_telegram(mut self, telegram: Arc<TelegramService>) -> Self {
        self.telegram = Some(telegram);
        self
    }
}
