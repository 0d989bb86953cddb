//! Provider-agnostic sending seam shared by the WhatsApp and email channels.

use async_trait::async_trait;
use campaign_core::config::ProvidersConfig;
use campaign_core::types::DeliveryChannel;
use campaign_core::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::email::SendGridEmailSender;
use crate::whatsapp::TwilioWhatsAppSender;

/// One message addressed to one recipient. `recipient` is a normalized
/// phone number for WhatsApp and an email address for email.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The provider accepted the message; `provider_id` is its reference
    /// when the response carried one.
    Accepted { provider_id: Option<String> },
    /// Nothing was sent because the channel has no credentials.
    Inert,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<SendOutcome, ProviderError>;

    fn provider_name(&self) -> &'static str;

    /// `false` for senders that never reach a provider.
    fn is_live(&self) -> bool {
        true
    }
}

/// Stand-in used when a channel's credentials are not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSender;

#[async_trait]
impl MessageSender for NoopSender {
    async fn send(&self, _message: &OutboundMessage) -> Result<SendOutcome, ProviderError> {
        Ok(SendOutcome::Inert)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// One sender per delivery channel.
#[derive(Clone)]
pub struct SenderSet {
    pub whatsapp: Arc<dyn MessageSender>,
    pub email: Arc<dyn MessageSender>,
}

impl SenderSet {
    pub fn new(whatsapp: Arc<dyn MessageSender>, email: Arc<dyn MessageSender>) -> Self {
        Self { whatsapp, email }
    }

    /// Both channels inert.
    pub fn inert() -> Self {
        Self::new(Arc::new(NoopSender), Arc::new(NoopSender))
    }

    /// Live senders for every channel whose credentials are present; the rest
    /// fall back to [`NoopSender`].
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let whatsapp: Arc<dyn MessageSender> = match config.twilio.credentials() {
            Some((sid, token)) => Arc::new(TwilioWhatsAppSender::new(
                client.clone(),
                &config.twilio.api_base_url,
                sid,
                token,
            )),
            None => {
                warn!("Twilio credentials not configured; WhatsApp sends are inert");
                Arc::new(NoopSender)
            }
        };

        let email: Arc<dyn MessageSender> = match config.sendgrid.api_key() {
            Some(key) => Arc::new(SendGridEmailSender::new(
                client,
                &config.sendgrid.api_base_url,
                key,
                config.sendgrid.sender_email.clone(),
            )),
            None => {
                warn!("SendGrid API key not configured; email sends are inert");
                Arc::new(NoopSender)
            }
        };

        info!(
            whatsapp = whatsapp.provider_name(),
            email = email.provider_name(),
            "Message senders initialized"
        );
        Ok(Self { whatsapp, email })
    }

    pub fn for_channel(&self, channel: DeliveryChannel) -> &Arc<dyn MessageSender> {
        match channel {
            DeliveryChannel::Whatsapp => &self.whatsapp,
            DeliveryChannel::Email => &self.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::config::{SendGridConfig, TwilioConfig};

    #[tokio::test]
    async fn test_noop_sender_is_inert() {
        let message = OutboundMessage {
            recipient: "+918329391715".to_string(),
            subject: None,
            body: "hello".to_string(),
        };
        assert_eq!(NoopSender.send(&message).await.unwrap(), SendOutcome::Inert);
        assert!(!NoopSender.is_live());
    }

    #[test]
    fn test_missing_credentials_fall_back_to_noop() {
        let senders = SenderSet::from_config(&ProvidersConfig::default()).unwrap();
        assert!(!senders.whatsapp.is_live());
        assert!(!senders.email.is_live());
    }

    #[test]
    fn test_configured_providers_are_live() {
        let config = ProvidersConfig {
            twilio: TwilioConfig {
                account_sid: Some("AC123".to_string()),
                auth_token: Some("secret".to_string()),
                ..TwilioConfig::default()
            },
            sendgrid: SendGridConfig {
                api_key: Some("SG.key".to_string()),
                sender_email: Some("offers@trustai.in".to_string()),
                ..SendGridConfig::default()
            },
            ..ProvidersConfig::default()
        };
        let senders = SenderSet::from_config(&config).unwrap();
        assert_eq!(senders.for_channel(DeliveryChannel::Whatsapp).provider_name(), "twilio");
        assert_eq!(senders.for_channel(DeliveryChannel::Email).provider_name(), "sendgrid");
        assert!(senders.email.is_live());
    }
}
