//! Email delivery through the SendGrid v3 mail API.

use async_trait::async_trait;
use campaign_core::ProviderError;
use serde_json::json;
use tracing::debug;

use crate::sender::{MessageSender, OutboundMessage, SendOutcome};

pub const EMAIL_SUBJECT: &str = "Personalized Insurance Offer - TrustAI";

const SIGNATURE: &str = "— Team TrustAI";

/// HTML body wrapping the campaign message.
pub fn render_email_html(message: &str) -> String {
    format!("<strong>{message}</strong><br><br>{SIGNATURE}")
}

pub struct SendGridEmailSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender_email: Option<String>,
}

impl SendGridEmailSender {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        sender_email: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/v3/mail/send", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            sender_email,
        }
    }
}

fn mail_payload(from: &str, message: &OutboundMessage) -> serde_json::Value {
    json!({
        "personalizations": [{ "to": [{ "email": message.recipient }] }],
        "from": { "email": from },
        "subject": message.subject.as_deref().unwrap_or(EMAIL_SUBJECT),
        "content": [{ "type": "text/html", "value": message.body }],
    })
}

#[async_trait]
impl MessageSender for SendGridEmailSender {
    async fn send(&self, message: &OutboundMessage) -> Result<SendOutcome, ProviderError> {
        let from = self
            .sender_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Misconfigured("sender email is not set".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&mail_payload(from, message))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let provider_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(to = %message.recipient, id = ?provider_id, "Email accepted");
        Ok(SendOutcome::Accepted { provider_id })
    }

    fn provider_name(&self) -> &'static str {
        "sendgrid"
    }
}
