//! End-to-end flow over the HTTP router: upload a customer sheet, then
//! dispatch a campaign to one of the resulting segments.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use campaign_api::{router, AppState};
use campaign_cache::{SegmentCache, SegmentReader};
use campaign_channels::{
    CampaignDisperser, MessageSender, NoopSender, OutboundMessage, SendOutcome, SenderSet,
};
use campaign_core::ProviderError;
use campaign_segmentation::SegmentationEngine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "campaign-express-boundary";

const HEADER: &str = "name,age,email,phone_number,location,income_lpa,life_event,insurance_type,whatsapp_usage_minutes_per_week,facebook_usage_minutes_per_week,instagram_usage_minutes_per_week,telegram_usage_minutes_per_week,gmail_usage_minutes_per_week,sms_usage_minutes_per_week,purchased";

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<SendOutcome, ProviderError> {
        self.sent.lock().push(message.clone());
        Ok(SendOutcome::Accepted { provider_id: None })
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    app: Router,
    segments: SegmentReader,
    whatsapp: Arc<RecordingSender>,
}

fn harness() -> Harness {
    let (writer, reader) = SegmentCache::new();
    let whatsapp = Arc::new(RecordingSender::default());
    let senders = SenderSet::new(whatsapp.clone(), Arc::new(NoopSender));
    let state = AppState {
        engine: Arc::new(SegmentationEngine::new(writer)),
        disperser: Arc::new(CampaignDisperser::new(reader.clone(), senders)),
    };
    Harness {
        app: router(state, 1024 * 1024),
        segments: reader,
        whatsapp,
    }
}

fn customer_sheet(rows: usize) -> String {
    sheet_with_labels(rows, |i| i % 2)
}

/// Only the first customer carries an allow-listed phone number.
fn sheet_with_labels(rows: usize, purchased: fn(usize) -> usize) -> String {
    let mut csv = String::from(HEADER);
    for i in 0..rows {
        let phone = if i == 0 {
            "8329391715".to_string()
        } else {
            format!("98{i:08}")
        };
        csv.push_str(&format!(
            "\nCustomer {i},{},customer{i}@example.com,{phone},Mumbai,{},New Job,{},{},{},{},{},{},{},{}",
            22 + (i * 9) % 40,
            4 + (i * 7) % 30,
            ["Health", "Life", "Car"][i % 3],
            15 + (i * 31) % 400,
            10 + (i * 17) % 200,
            10 + (i * 23) % 300,
            5 + (i * 11) % 90,
            5 + (i * 13) % 500,
            5 + (i * 3) % 60,
            purchased(i),
        ));
    }
    csv
}

fn multipart_request(field: &str, csv: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"customers.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/execute-campaign")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_endpoints() {
    let h = harness();
    for uri in ["/", "/health"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = call(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "Backend Running" }));
    }
}

#[tokio::test]
async fn test_execute_then_send_campaign() {
    let h = harness();

    let (status, report) = call(&h.app, multipart_request("file", &customer_sheet(40))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_customers"], 40);
    let segments = report["segments"].as_array().unwrap();
    assert!(!segments.is_empty() && segments.len() <= 4);
    let counted: u64 = segments
        .iter()
        .map(|s| s["customer_count"].as_u64().unwrap())
        .sum();
    assert_eq!(counted, 40);

    let cluster_id = h
        .segments
        .segment_ids()
        .into_iter()
        .find(|&id| {
            h.segments
                .get(id)
                .is_some_and(|members| members.iter().any(|c| c.phone_number == "8329391715"))
        })
        .unwrap();

    let (status, dispatch) = call(
        &h.app,
        json_request(
            "/send-campaign",
            json!({ "cluster_id": cluster_id, "message": "Protect what matters" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        dispatch,
        json!({
            "cluster_id": cluster_id,
            "channel_used": "whatsapp",
            "messages_sent": 1,
            "failed": 0
        })
    );

    let sent = h.whatsapp.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "+918329391715");
    assert_eq!(sent[0].body, "Protect what matters");
}

#[tokio::test]
async fn test_send_to_unknown_cluster() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        json_request("/send-campaign", json!({ "cluster_id": 3, "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "error": "Cluster not found" }));
    assert!(h.whatsapp.sent.lock().is_empty());
}

#[tokio::test]
async fn test_missing_columns_is_bad_request() {
    let h = harness();
    let (status, body) = call(&h.app, multipart_request("file", "name,age\nIsha,30")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "schema_error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Missing required columns"));
}

#[tokio::test]
async fn test_single_class_upload_keeps_previous_cache() {
    let h = harness();
    let (status, _) = call(&h.app, multipart_request("file", &customer_sheet(20))).await;
    assert_eq!(status, StatusCode::OK);
    let cached = h.segments.segment_ids();

    let unsold = sheet_with_labels(8, |_| 0);
    let (status, body) = call(&h.app, multipart_request("file", &unsold)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "degenerate_input");
    assert_eq!(h.segments.segment_ids(), cached);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let h = harness();
    let (status, body) = call(&h.app, multipart_request("sheet", &customer_sheet(10))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_upload");
}
