//! Campaign Express: customer segmentation and campaign dispatch service.
//!
//! Main entry point that wires the segment cache, scoring engine and
//! message senders together and starts the server.

use campaign_api::{ApiServer, AppState};
use campaign_cache::SegmentCache;
use campaign_channels::{CampaignDisperser, SenderSet};
use campaign_core::config::AppConfig;
use campaign_segmentation::SegmentationEngine;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "campaign-express")]
#[command(about = "Customer segmentation and campaign dispatch service")]
#[command(version)]
struct Cli {
    /// HTTP bind address (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Twilio account SID
    #[arg(long, env = "TWILIO_SID", hide_env_values = true)]
    twilio_sid: Option<String>,

    /// Twilio auth token
    #[arg(long, env = "TWILIO_AUTH", hide_env_values = true)]
    twilio_auth: Option<String>,

    /// SendGrid API key
    #[arg(long, env = "SENDGRID_API_KEY", hide_env_values = true)]
    sendgrid_api_key: Option<String>,

    /// Verified SendGrid sender address
    #[arg(long, env = "SENDGRID_SENDER_EMAIL")]
    sendgrid_sender_email: Option<String>,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.api.host = host;
        }
        if let Some(port) = self.http_port {
            config.api.http_port = port;
        }
        let twilio = &mut config.providers.twilio;
        twilio.account_sid = self.twilio_sid.or(twilio.account_sid.take());
        twilio.auth_token = self.twilio_auth.or(twilio.auth_token.take());
        let sendgrid = &mut config.providers.sendgrid;
        sendgrid.api_key = self.sendgrid_api_key.or(sendgrid.api_key.take());
        sendgrid.sender_email = self
            .sendgrid_sender_email
            .or(sendgrid.sender_email.take());
        if self.no_metrics {
            config.metrics.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campaign_express=info,campaign_api=info,campaign_segmentation=info,campaign_channels=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Express starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    cli.apply(&mut config);

    info!(
        host = %config.api.host,
        http_port = config.api.http_port,
        max_upload_bytes = config.api.max_upload_bytes,
        metrics = config.metrics.enabled,
        "Configuration loaded"
    );

    // The engine owns the only writer; the disperser only reads.
    let (writer, reader) = SegmentCache::new();
    let senders = SenderSet::from_config(&config.providers)?;

    let state = AppState {
        engine: Arc::new(SegmentationEngine::new(writer)),
        disperser: Arc::new(CampaignDisperser::new(reader, senders)),
    };

    let api_server = ApiServer::new(config.clone(), state);

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Campaign Express is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
