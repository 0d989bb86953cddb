//! Zero-mean / unit-variance feature scaling, fit fresh on every batch.

use campaign_core::{CampaignError, CampaignResult};
use ndarray::{Array1, Array2, Axis};

/// Per-column standardization using the population standard deviation.
/// Columns with no spread keep a scale of 1 so they map to zero.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> CampaignResult<Self> {
        let mean = data.mean_axis(Axis(0)).ok_or_else(|| {
            CampaignError::DegenerateInput("cannot standardize an empty batch".to_string())
        })?;
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std < 10.0 * f64::EPSILON { 1.0 } else { std });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    pub fn fit_transform(data: &Array2<f64>) -> CampaignResult<Array2<f64>> {
        Ok(Self::fit(data)?.transform(data))
    }
}
