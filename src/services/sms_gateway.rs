use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::services::rate_limit::RateLimiter;

#[derive(Debug, Clone)]
pub struct SmsSendResult {
    pub message_id: String,
    pub provider: &'static str,
}

pub enum SmsProvider {
    Twilio {
        account_sid: String,
        auth_token: String,
        from_number: String,
    },
    Textbelt {
        api_key: String,
    },
}

#[derive(Debug, Deserialize)]
struct TwilioResponse {
    sid: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextbeltResponse {
    success: bool,
    #[serde(rename = "textId")]
    text_id: Option<serde_json::Value>,
    error: Option<String>,
}

impl SmsProvider {
    pub fn name(&self) -> &'static str {
        match self {
            SmsProvider::Twilio { .. } => "twilio",
            SmsProvider::Textbelt { .. } => "textbelt",
        }
    }

    async fn send(&self, client: &Client, phone: &str, message: &str) -> Result<SmsSendResult> {
        match self {
            SmsProvider::Twilio {
                account_sid,
                auth_token,
                from_number,
            } => {
                let url = format!(
                    "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
                    account_sid
                );

                let response = client
                    .post(&url)
                    .basic_auth(account_sid, Some(auth_token))
                    .form(&[("To", phone), ("From", from_number.as_str()), ("Body", message)])
                    .send()
                    .await?;

                let status = response.status();
                let body: TwilioResponse = response.json().await?;

                if !status.is_success() {
                    return Err(AppError::ExternalApi(format!(
                        "Twilio returned {}: {}",
                        status,
                        body.message.unwrap_or_default()
                    )));
                }

                Ok(SmsSendResult {
                    message_id: body.sid.unwrap_or_default(),
                    provider: "twilio",
                })
            }
            SmsProvider::Textbelt { api_key } => {
                let response = client
                    .post("https://textbelt.com/text")
                    .json(&json!({
                        "phone": phone,
                        "message": message,
                        "key": api_key,
                    }))
                    .send()
                    .await?;

                let body: TextbeltResponse = response.json().await?;

                if !body.success {
                    return Err(AppError::ExternalApi(
                        body.error.unwrap_or_else(|| "Textbelt API error".to_string()),
                    ));
                }

                Ok(SmsSendResult {
                    message_id: body
                        .text_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    provider: "textbelt",
                })
            }
        }
    }
}

/// Ordered provider chain. The first provider to accept the message wins;
/// the ledger only debits a credit after this gateway reports success.
pub struct SmsGateway {
    providers: Vec<SmsProvider>,
    limiter: RateLimiter,
    client: Client,
}

impl SmsGateway {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers = Vec::new();

        if let (Some(account_sid), Some(auth_token), Some(from_number)) = (
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_from_number.clone(),
        ) {
            providers.push(SmsProvider::Twilio {
                account_sid,
                auth_token,
                from_number,
            });
        }

        if let Some(api_key) = config.textbelt_api_key.clone() {
            providers.push(SmsProvider::Textbelt { api_key });
        }

        SmsGateway {
            providers,
            limiter: RateLimiter::new(config.sms_min_interval),
            client: Client::new(),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub async fn send(&self, phone: &str, message: &str) -> Result<SmsSendResult> {
        if self.providers.is_empty() {
            return Err(AppError::ConfigurationError(
                "no SMS providers configured".to_string(),
            ));
        }

        self.limiter.acquire().await;

        let mut last_error = None;
        for provider in &self.providers {
            tracing::info!("attempting SMS via {}", provider.name());
            match provider.send(&self.client, phone, message).await {
                Ok(result) => {
                    tracing::info!(
                        provider = result.provider,
                        message_id = %result.message_id,
                        "SMS accepted"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::SmsDeliveryFailed(match last_error {
            Some(e) => format!("all providers failed, last error: {}", e),
            None => "all providers failed".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bare_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            database_name: String::new(),
            port: 0,
            host: String::new(),
            telegram_bot_token: None,
            telegram_admin_chat_id: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            textbelt_api_key: None,
            sms_min_interval: Duration::from_millis(0),
        }
    }

    #[test]
    fn providers_assemble_in_priority_order() {
        let mut config = bare_config();
        config.twilio_account_sid = Some("sid".into());
        config.twilio_auth_token = Some("token".into());
        config.twilio_from_number = Some("+15550000".into());
        config.textbelt_api_key = Some("key".into());

        let gateway = SmsGateway::from_config(&config);
        assert_eq!(gateway.provider_count(), 2);
        assert_eq!(gateway.providers[0].name(), "twilio");
        assert_eq!(gateway.providers[1].name(), "textbelt");
    }

    #[test]
    fn partial_twilio_credentials_are_skipped() {
        let mut config = bare_config();
        config.twilio_account_sid = Some("sid".into());

        let gateway = SmsGateway::from_config(&config);
        assert_eq!(gateway.provider_count(), 0);
    }

    #[tokio::test]
    async fn send_with_no_providers_is_a_configuration_error() {
        let gateway = SmsGateway::from_config(&bare_config());
        let result = gateway.send("+15550001", "hi").await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }
}
