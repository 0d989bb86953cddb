//! Campaign disperser: fans a single message out to every allow-listed
//! member of a cached segment.

use campaign_cache::SegmentReader;
use campaign_core::types::{
    CachedCustomer, DeliveryChannel, DispatchOutcome, DispatchReport, DispatchRequest,
};
use campaign_core::{CampaignError, CampaignResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::email::{render_email_html, EMAIL_SUBJECT};
use crate::phone::{normalize_phone, AllowList};
use crate::sender::{OutboundMessage, SendOutcome, SenderSet};

/// Metric label for a requested channel. Every unrecognized selector shares
/// the `unsupported` label.
fn metric_channel_label(channel: Option<DeliveryChannel>) -> &'static str {
    channel.map_or("unsupported", |c| c.as_str())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    sent: u64,
    failed: u64,
    skipped: u64,
}

pub struct CampaignDisperser {
    segments: SegmentReader,
    senders: SenderSet,
    allow_list: AllowList,
}

impl CampaignDisperser {
    pub fn new(segments: SegmentReader, senders: SenderSet) -> Self {
        Self::with_allow_list(segments, senders, AllowList::demo())
    }

    pub fn with_allow_list(
        segments: SegmentReader,
        senders: SenderSet,
        allow_list: AllowList,
    ) -> Self {
        Self {
            segments,
            senders,
            allow_list,
        }
    }

    /// Members of a cached segment. Negative and unknown ids are both
    /// reported as `SegmentNotFound`.
    fn segment(&self, cluster_id: i64) -> CampaignResult<Arc<Vec<CachedCustomer>>> {
        usize::try_from(cluster_id)
            .ok()
            .and_then(|id| self.segments.get(id))
            .ok_or(CampaignError::SegmentNotFound(cluster_id))
    }

    /// Send `request.message` to the members of `request.cluster_id`.
    ///
    /// Sends run one after another; a failing recipient is counted and
    /// skipped over. Recipients outside the allow-list are not counted.
    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchOutcome {
        let customers = match self.segment(request.cluster_id) {
            Ok(customers) => customers,
            Err(e) => {
                info!(error = %e, code = e.code(), "Dispatch skipped");
                metrics::counter!("dispatch.segment_not_found").increment(1);
                return DispatchOutcome::not_found();
            }
        };

        let channel_used = request.channel.trim().to_ascii_lowercase();
        let channel = DeliveryChannel::parse(&channel_used);
        let start = Instant::now();
        let tally = match channel {
            Some(channel) => self.deliver(channel, &customers, &request.message).await,
            None => {
                warn!(channel = %channel_used, "Unsupported channel; nothing sent");
                Tally::default()
            }
        };

        let label = metric_channel_label(channel);
        metrics::counter!("dispatch.messages_sent", "channel" => label).increment(tally.sent);
        metrics::counter!("dispatch.messages_failed", "channel" => label).increment(tally.failed);
        metrics::counter!("dispatch.recipients_skipped").increment(tally.skipped);
        info!(
            cluster_id = request.cluster_id,
            channel = %channel_used,
            sent = tally.sent,
            failed = tally.failed,
            skipped = tally.skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Campaign dispatched"
        );

        DispatchOutcome::Completed(DispatchReport {
            cluster_id: request.cluster_id,
            channel_used,
            messages_sent: tally.sent,
            failed: tally.failed,
        })
    }

    async fn deliver(
        &self,
        channel: DeliveryChannel,
        customers: &[CachedCustomer],
        message: &str,
    ) -> Tally {
        let sender = self.senders.for_channel(channel);
        let mut tally = Tally::default();

        for customer in customers {
            let phone = normalize_phone(&customer.phone_number);
            if !self.allow_list.permits(&phone) {
                debug!(phone = %phone, "Recipient not on allow-list");
                tally.skipped += 1;
                continue;
            }

            let outbound = match channel {
                DeliveryChannel::Whatsapp => OutboundMessage {
                    recipient: phone,
                    subject: None,
                    body: message.to_string(),
                },
                DeliveryChannel::Email => OutboundMessage {
                    recipient: customer.email.clone(),
                    subject: Some(EMAIL_SUBJECT.to_string()),
                    body: render_email_html(message),
                },
            };

            match sender.send(&outbound).await {
                Ok(SendOutcome::Accepted { .. }) => tally.sent += 1,
                Ok(SendOutcome::Inert) => {}
                Err(e) => {
                    warn!(
                        provider = sender.provider_name(),
                        recipient = %outbound.recipient,
                        error = %e,
                        "Message delivery failed"
                    );
                    tally.failed += 1;
                }
            }
        }
        tally
    }
}
