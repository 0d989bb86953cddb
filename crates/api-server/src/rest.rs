//! REST API handlers for campaign execution, dispatch and liveness.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use campaign_channels::CampaignDisperser;
use campaign_core::types::{CampaignReport, DispatchOutcome, DispatchRequest};
use campaign_core::CampaignError;
use campaign_segmentation::SegmentationEngine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

/// Multipart field carrying the customer spreadsheet.
const UPLOAD_FIELD: &str = "file";

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SegmentationEngine>,
    pub disperser: Arc<CampaignDisperser>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Documentation shape of the `/execute-campaign` upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CsvUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

fn campaign_error_response(err: &CampaignError) -> ApiError {
    if err.is_client_error() {
        warn!(error = %err, "Campaign execution rejected");
        metrics::counter!("api.validation_errors").increment(1);
        error_response(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    } else {
        error!(error = %err, "Campaign execution failed");
        metrics::counter!("api.errors").increment(1);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            err.code(),
            "Internal processing error",
        )
    }
}

/// GET /: Liveness banner.
#[utoipa::path(
    get,
    path = "/",
    tag = "Operations",
    responses((status = 200, description = "Service is up", body = StatusResponse))
)]
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Backend Running".to_string(),
    })
}

/// GET /health: Same payload as `/`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is up", body = StatusResponse))
)]
pub async fn health_check() -> Json<StatusResponse> {
    status().await
}

/// POST /execute-campaign: Segment and score an uploaded customer sheet.
#[utoipa::path(
    post,
    path = "/execute-campaign",
    tag = "Campaigns",
    request_body(content = CsvUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Segments computed and cached", body = CampaignReport),
        (status = 400, description = "Upload is malformed or cannot be segmented", body = ErrorResponse),
        (status = 500, description = "Internal processing error", body = ErrorResponse),
    )
)]
pub async fn execute_campaign(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CampaignReport>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "malformed_upload", e.body_text())
    })? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(|e| {
                error_response(StatusCode::BAD_REQUEST, "malformed_upload", e.body_text())
            })?;
            upload = Some(bytes);
            break;
        }
    }

    let Some(bytes) = upload else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "malformed_upload",
            format!("multipart field '{UPLOAD_FIELD}' is required"),
        ));
    };
    info!(bytes = bytes.len(), "Customer sheet received");

    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.execute_csv(&bytes[..]))
        .await
        .map_err(|e| {
            error!(error = %e, "Segmentation task aborted");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error",
            )
        })?;

    result
        .map(Json)
        .map_err(|e| campaign_error_response(&e))
}

/// POST /send-campaign: Message every allow-listed member of a segment.
#[utoipa::path(
    post,
    path = "/send-campaign",
    tag = "Campaigns",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Dispatch report, or a not-found payload for an unknown segment", body = DispatchOutcome),
    )
)]
pub async fn send_campaign(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Json<DispatchOutcome> {
    Json(state.disperser.dispatch(&request).await)
}
