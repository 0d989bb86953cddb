//! Customer segmentation pipeline: CSV ingestion, feature building,
//! k-means clustering, purchase-propensity scoring and per-segment summaries.

#![warn(clippy::unwrap_used)]

pub mod encoding;
pub mod engine;
pub mod ingest;
pub mod kmeans;
pub mod logistic;
pub mod scaler;

pub use engine::SegmentationEngine;
pub use ingest::{load_customers, CustomerTable};
