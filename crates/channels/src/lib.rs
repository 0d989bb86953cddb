//! Campaign dispatch: delivers a message to every allow-listed member of a
//! cached segment over WhatsApp (Twilio) or email (SendGrid).

#![warn(clippy::unwrap_used)]

pub mod dispatcher;
pub mod email;
pub mod phone;
pub mod sender;
pub mod whatsapp;

pub use dispatcher::CampaignDisperser;
pub use email::SendGridEmailSender;
pub use phone::{normalize_phone, AllowList};
pub use sender::{MessageSender, NoopSender, OutboundMessage, SendOutcome, SenderSet};
pub use whatsapp::TwilioWhatsAppSender;
