//! Segmentation & scoring engine: clusters a customer batch, scores purchase
//! propensity, summarizes each segment and publishes recipient lists to the
//! segment cache.

use campaign_cache::{SegmentMap, SegmentWriter};
use campaign_core::types::{
    CachedCustomer, CampaignReport, CustomerRecord, DeliveryChannel, SegmentSummary,
};
use campaign_core::{CampaignError, CampaignResult};
use ndarray::Array2;
use std::collections::HashMap;
use std::hash::Hash;
use std::io::Read;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::encoding::encode_column;
use crate::ingest::{load_customers, CustomerTable};
use crate::kmeans::{self, KMeansParams};
use crate::logistic::{self, LogisticParams};
use crate::scaler::StandardScaler;

/// Number of customers echoed back per segment.
pub const PREVIEW_SIZE: usize = 5;

/// Cluster id and purchase probability for every row of a batch.
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub labels: Vec<usize>,
    pub probabilities: Vec<f64>,
}

pub struct SegmentationEngine {
    cache: SegmentWriter,
    kmeans: KMeansParams,
    logistic: LogisticParams,
    preview_size: usize,
}

impl SegmentationEngine {
    pub fn new(cache: SegmentWriter) -> Self {
        Self {
            cache,
            kmeans: KMeansParams::default(),
            logistic: LogisticParams::default(),
            preview_size: PREVIEW_SIZE,
        }
    }

    /// Ingest a CSV upload and run the full pipeline on it.
    pub fn execute_csv<R: Read>(&self, reader: R) -> CampaignResult<CampaignReport> {
        let table = load_customers(reader)?;
        self.execute(&table)
    }

    /// Cluster, score and summarize `table`, then replace the segment cache.
    /// The cache is left untouched if any step fails.
    pub fn execute(&self, table: &CustomerTable) -> CampaignResult<CampaignReport> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        let records = &table.records;

        let scored = self.score(records)?;
        let (segments, staged) = summarize(records, &scored, self.preview_size);
        let overall = overall_conversion(&scored.probabilities);

        let generation = self.cache.replace_all(staged);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        metrics::counter!("campaign.executions").increment(1);
        metrics::counter!("campaign.customers_ingested").increment(records.len() as u64);
        metrics::histogram!("campaign.execution_ms").record(elapsed_ms as f64);
        info!(
            run_id = %run_id,
            customers = records.len(),
            duplicates_removed = table.duplicates_removed,
            segments = segments.len(),
            overall_expected_conversion = overall,
            cache_generation = generation,
            elapsed_ms,
            "Campaign executed"
        );

        Ok(CampaignReport {
            total_customers: records.len(),
            overall_expected_conversion: overall,
            segments,
        })
    }

    /// Cluster assignment and purchase probability per record.
    pub fn score(&self, records: &[CustomerRecord]) -> CampaignResult<ScoredBatch> {
        if records.is_empty() {
            return Err(CampaignError::DegenerateInput(
                "the upload contains no customers".to_string(),
            ));
        }
        let labels: Vec<bool> = records.iter().map(|r| r.purchased).collect();
        if labels.iter().all(|&l| l == labels[0]) {
            return Err(CampaignError::DegenerateInput(
                "purchased has a single class; at least one buyer and one non-buyer are required"
                    .to_string(),
            ));
        }

        let cluster_features = Array2::from_shape_fn((records.len(), 3), |(i, j)| {
            let r = &records[i];
            match j {
                0 => f64::from(r.age),
                1 => r.income_lpa,
                _ => r.total_engagement,
            }
        });
        let clustering = kmeans::fit(
            &self.kmeans,
            &StandardScaler::fit_transform(&cluster_features)?,
        )?;

        let insurance_codes = encode_column(records.iter().map(|r| r.insurance_type.as_str()));
        let life_event_codes = encode_column(records.iter().map(|r| r.life_event.as_str()));
        let model_features = Array2::from_shape_fn((records.len(), 5), |(i, j)| {
            let r = &records[i];
            match j {
                0 => f64::from(r.age),
                1 => r.income_lpa,
                2 => r.total_engagement,
                3 => insurance_codes[i] as f64,
                _ => life_event_codes[i] as f64,
            }
        });
        let model_scaled = StandardScaler::fit_transform(&model_features)?;
        let model = logistic::fit(&self.logistic, &model_scaled, &labels)?;

        Ok(ScoredBatch {
            labels: clustering.labels,
            probabilities: model.predict_proba(&model_scaled).to_vec(),
        })
    }
}

/// Per-segment summaries in order of first appearance, plus the full
/// recipient list of each segment for the cache.
pub fn summarize(
    records: &[CustomerRecord],
    scored: &ScoredBatch,
    preview_size: usize,
) -> (Vec<SegmentSummary>, SegmentMap) {
    let mut order: Vec<usize> = Vec::new();
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for (row, &cluster_id) in scored.labels.iter().enumerate() {
        members
            .entry(cluster_id)
            .or_insert_with(|| {
                order.push(cluster_id);
                Vec::new()
            })
            .push(row);
    }

    let mut staged = SegmentMap::with_capacity(order.len());
    let mut summaries = Vec::with_capacity(order.len());

    for cluster_id in order {
        let rows = members.remove(&cluster_id).unwrap_or_default();
        let customers: Vec<CachedCustomer> = rows
            .iter()
            .map(|&row| {
                let r = &records[row];
                CachedCustomer {
                    name: r.name.clone(),
                    email: r.email.clone(),
                    phone_number: r.phone_number.clone(),
                    purchase_probability: scored.probabilities[row],
                }
            })
            .collect();

        let probabilities: Vec<f64> = rows.iter().map(|&row| scored.probabilities[row]).collect();
        let insurance_type =
            dominant(rows.iter().map(|&row| records[row].insurance_type.as_str()))
                .unwrap_or_default()
                .to_string();
        let recommended_channel =
            dominant(rows.iter().map(|&row| records[row].most_active_platform))
                .map(DeliveryChannel::recommended_for)
                .unwrap_or(DeliveryChannel::Whatsapp);

        summaries.push(SegmentSummary {
            cluster_id,
            customer_count: rows.len(),
            average_purchase_probability: round4(mean(&probabilities)),
            insurance_type,
            recommended_channel,
            customers_preview: customers.iter().take(preview_size).cloned().collect(),
        });
        staged.insert(cluster_id, customers);
    }

    (summaries, staged)
}

/// Most frequent value; ties go to the value encountered first.
pub fn dominant<T: Eq + Hash + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (position, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

/// Mean purchase probability over every scored customer, to four places.
fn overall_conversion(probabilities: &[f64]) -> f64 {
    round4(mean(probabilities))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
