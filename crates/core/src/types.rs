//! Domain types shared by the ingestion, segmentation, dispatch and API layers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Messaging platforms tracked by weekly usage minutes, in the fixed column
/// order used for tie breaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Whatsapp,
    Facebook,
    Instagram,
    Telegram,
    Gmail,
    Sms,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Whatsapp,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Telegram,
        Platform::Gmail,
        Platform::Sms,
    ];

    /// Name of the CSV column holding this platform's weekly usage minutes.
    pub fn column(&self) -> &'static str {
        match self {
            Platform::Whatsapp => "whatsapp_usage_minutes_per_week",
            Platform::Facebook => "facebook_usage_minutes_per_week",
            Platform::Instagram => "instagram_usage_minutes_per_week",
            Platform::Telegram => "telegram_usage_minutes_per_week",
            Platform::Gmail => "gmail_usage_minutes_per_week",
            Platform::Sms => "sms_usage_minutes_per_week",
        }
    }
}

/// One customer row after normalization, with derived engagement features.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub name: String,
    pub age: u32,
    /// Lower-cased and trimmed.
    pub email: String,
    pub phone_number: String,
    pub location: Option<String>,
    pub income_lpa: f64,
    pub life_event: String,
    pub insurance_type: String,
    /// Weekly usage minutes indexed like [`Platform::ALL`].
    pub usage_minutes: [f64; 6],
    pub purchased: bool,
    pub total_engagement: f64,
    pub most_active_platform: Platform,
}

/// Recipient entry kept in the segment cache and shown in previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CachedCustomer {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub purchase_probability: f64,
}

/// Outbound channel a segment should be reached on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Whatsapp,
    Email,
}

impl DeliveryChannel {
    /// Case-insensitive lookup; unknown selectors yield `None`.
    pub fn parse(selector: &str) -> Option<Self> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Some(DeliveryChannel::Whatsapp),
            "email" => Some(DeliveryChannel::Email),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Whatsapp => "whatsapp",
            DeliveryChannel::Email => "email",
        }
    }

    /// Channel recommended for a segment whose members are most active on
    /// `platform`.
    pub fn recommended_for(platform: Platform) -> Self {
        if platform.column().contains("gmail") {
            DeliveryChannel::Email
        } else {
            DeliveryChannel::Whatsapp
        }
    }
}

/// Summary of one k-means segment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SegmentSummary {
    pub cluster_id: usize,
    pub customer_count: usize,
    pub average_purchase_probability: f64,
    /// Most frequent insurance type among the segment's members.
    pub insurance_type: String,
    pub recommended_channel: DeliveryChannel,
    pub customers_preview: Vec<CachedCustomer>,
}

/// Response of a campaign execution.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CampaignReport {
    pub total_customers: usize,
    pub overall_expected_conversion: f64,
    pub segments: Vec<SegmentSummary>,
}

fn default_channel() -> String {
    DeliveryChannel::Whatsapp.as_str().to_string()
}

/// Request to broadcast a message to a cached segment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub cluster_id: i64,
    pub message: String,
    /// "whatsapp" (default) or "email"; other values send nothing.
    #[serde(default = "default_channel")]
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DispatchReport {
    pub cluster_id: i64,
    pub channel_used: String,
    pub messages_sent: u64,
    pub failed: u64,
}

/// Dispatch result as returned to the operator. An unknown segment is a
/// structured payload rather than a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DispatchOutcome {
    Completed(DispatchReport),
    NotFound { error: String },
}

impl DispatchOutcome {
    pub fn not_found() -> Self {
        DispatchOutcome::NotFound {
            error: "Cluster not found".to_string(),
        }
    }
}
