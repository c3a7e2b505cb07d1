use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        InlineButton {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Fire-and-forget alerting channel to the admin chat. A slow or failing
/// Telegram API can never block or fail a ledger operation: callers use
/// `spawn_notify` and failures end up in the log, nowhere else.
#[derive(Clone)]
pub struct TelegramService {
    token: String,
    admin_chat_id: String,
    client: Client,
}

impl TelegramService {
    pub fn new(token: String, admin_chat_id: String) -> Self {
        TelegramService {
            token,
            admin_chat_id,
            client: Client::new(),
        }
    }

    pub async fn notify(&self, text: &str, buttons: Option<Vec<Vec<InlineButton>>>) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let mut body = json!({
            "chat_id": self.admin_chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        if let Some(buttons) = buttons {
            body["reply_markup"] = json!({ "inline_keyboard": buttons });
        }

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Telegram API returned {}: {}",
                status, detail
            )));
        }

        Ok(())
    }

    pub fn spawn_notify(&self, text: String, buttons: Option<Vec<Vec<InlineButton>>>) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.notify(&text, buttons).await {
                tracing::warn!("telegram notification failed: {}", e);
            }
        });
    }
}

/// Alert sent when a new payment lands, with one-tap approve/reject buttons.
pub fn payment_alert(email: &str, amount: &str, txid: &str, payment_id: &str) -> (String, Vec<Vec<InlineButton>>) {
    let text = format!(
        "<b>💰 New Payment Request!</b>\n\n\
         <b>User:</b> {}\n\
         <b>Amount:</b> ${}\n\
         <b>TXID:</b> <code>{}</code>\n\n\
         <i>Approve below or in the admin panel.</i>",
        email, amount, txid
    );

    let buttons = vec![vec![
        InlineButton::new("✅ Approve", format!("approve_{}", payment_id)),
        InlineButton::new("❌ Reject", format!("reject_{}", payment_id)),
    ]];

    (text, buttons)
}

pub fn approval_alert(email: &str, amount: &str, credits: i64) -> String {
    format!(
        "✅ Payment Approved\n\nUser: {}\nAmount: ${}\nCredits added: {}",
        email, amount, credits
    )
}

pub fn rejection_alert(email: &str, amount: &str) -> String {
    format!("❌ Payment Rejected\n\nUser: {}\nAmount: ${}", email, amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_alert_embeds_payment_id_in_callbacks() {
        let (text, buttons) = payment_alert("a@x.com", "20", "tx1", "65f000000000000000000001");

        assert!(text.contains("a@x.com"));
        assert!(text.contains("$20"));
        assert!(text.contains("<code>tx1</code>"));

        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0][0].callback_data, "approve_65f000000000000000000001");
        assert_eq!(buttons[0][1].callback_data, "reject_65f000000000000000000001");
    }

    #[test]
    fn decision_alerts_name_the_user() {
        assert!(approval_alert("a@x.com", "20", 20).contains("Credits added: 20"));
        assert!(rejection_alert("a@x.com", "4.99").contains("$4.99"));
    }
}
