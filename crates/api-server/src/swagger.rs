//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campaign Express API",
        version = "0.1.0",
        description = "Customer segmentation and campaign dispatch.\n\nUpload a customer sheet to segment and score it, then message a cached segment over WhatsApp or email.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Campaigns", description = "Segment execution and campaign dispatch"),
        (name = "Operations", description = "Liveness endpoints"),
    ),
    paths(
        // Campaigns
        crate::rest::execute_campaign,
        crate::rest::send_campaign,
        // Operations
        crate::rest::status,
        crate::rest::health_check,
    ),
    components(schemas(
        campaign_core::types::CachedCustomer,
        campaign_core::types::DeliveryChannel,
        campaign_core::types::SegmentSummary,
        campaign_core::types::CampaignReport,
        campaign_core::types::DispatchRequest,
        campaign_core::types::DispatchReport,
        campaign_core::types::DispatchOutcome,
        crate::rest::CsvUpload,
        crate::rest::StatusResponse,
        crate::rest::ErrorResponse,
    ))
)]
pub struct ApiDoc;
