//! WhatsApp delivery through the Twilio Messages API.

use async_trait::async_trait;
use campaign_core::ProviderError;
use serde::Deserialize;
use tracing::debug;

use crate::sender::{MessageSender, OutboundMessage, SendOutcome};

/// Twilio sandbox identity every WhatsApp message is sent from.
pub const WHATSAPP_SANDBOX_SENDER: &str = "whatsapp:+14155238886";

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

pub struct TwilioWhatsAppSender {
    client: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioWhatsAppSender {
    pub fn new(client: reqwest::Client, base_url: &str, account_sid: &str, auth_token: &str) -> Self {
        Self {
            client,
            endpoint: messages_endpoint(base_url, account_sid),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
        }
    }
}

fn messages_endpoint(base_url: &str, account_sid: &str) -> String {
    format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        base_url.trim_end_matches('/'),
        account_sid
    )
}

/// `whatsapp:`-prefixed address for a normalized phone number.
pub fn whatsapp_address(phone: &str) -> String {
    format!("whatsapp:{phone}")
}

#[async_trait]
impl MessageSender for TwilioWhatsAppSender {
    async fn send(&self, message: &OutboundMessage) -> Result<SendOutcome, ProviderError> {
        let to = whatsapp_address(&message.recipient);
        let form = [
            ("From", WHATSAPP_SANDBOX_SENDER),
            ("To", to.as_str()),
            ("Body", message.body.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
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
            .json::<MessageResource>()
            .await
            .ok()
            .and_then(|r| r.sid);
        debug!(to = %to, sid = ?provider_id, "WhatsApp message accepted");
        Ok(SendOutcome::Accepted { provider_id })
    }

    fn provider_name(&self) -> &'static str {
        "twilio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_endpoint() {
        assert_eq!(
            messages_endpoint("https://api.twilio.com/", "AC123"),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_whatsapp_address() {
        assert_eq!(whatsapp_address("+918329391715"), "whatsapp:+918329391715");
    }
}
