//! Binary logistic regression for purchase propensity.
//!
//! Minimizes `0.5 * ||w||^2 + C * sum(log_loss)` with an unpenalized
//! intercept, using damped Newton-Raphson steps.

use campaign_core::{CampaignError, CampaignResult};
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LogisticParams {
    pub max_iterations: usize,
    /// Inverse regularization strength.
    pub c: f64,
    /// Stop once the largest gradient component drops below this.
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            c: 1.0,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl LogisticModel {
    /// Probability of the positive class for every row of `features`.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        features
            .dot(&self.coefficients)
            .mapv(|z| sigmoid(z + self.intercept))
    }
}

/// Fit on standardized `features` against boolean `labels`.
pub fn fit(
    params: &LogisticParams,
    features: &Array2<f64>,
    labels: &[bool],
) -> CampaignResult<LogisticModel> {
    let n = features.nrows();
    if n != labels.len() {
        return Err(CampaignError::DegenerateInput(format!(
            "{n} feature rows but {} labels",
            labels.len()
        )));
    }
    let positives = labels.iter().filter(|&&l| l).count();
    if positives == 0 || positives == n {
        return Err(CampaignError::DegenerateInput(
            "purchased must contain both classes to fit a classifier".to_string(),
        ));
    }

    // Design matrix with a leading intercept column.
    let d = features.ncols() + 1;
    let mut design = Array2::<f64>::ones((n, d));
    design.slice_mut(ndarray::s![.., 1..]).assign(features);
    let y = Array1::from_iter(labels.iter().map(|&l| if l { 1.0 } else { 0.0 }));

    let mut weights = Array1::<f64>::zeros(d);
    let mut objective = penalized_loss(params.c, &design, &y, &weights);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < params.max_iterations {
        iterations += 1;
        let probs = design.dot(&weights).mapv(sigmoid);

        let mut gradient = design.t().dot(&(&probs - &y)) * params.c;
        for j in 1..d {
            gradient[j] += weights[j];
        }
        if gradient.iter().all(|g| g.abs() < params.tolerance) {
            converged = true;
            break;
        }

        let curvature = probs.mapv(|p| p * (1.0 - p) * params.c);
        let weighted = &design * &curvature.insert_axis(Axis(1));
        let mut hessian = design.t().dot(&weighted);
        for j in 1..d {
            hessian[[j, j]] += 1.0;
        }

        let step = solve(hessian, gradient).ok_or_else(|| {
            CampaignError::DegenerateInput(
                "purchase features are collinear; cannot fit classifier".to_string(),
            )
        })?;

        // Halve the step until the objective stops increasing.
        let mut scale = 1.0;
        let mut accepted = false;
        for _ in 0..30 {
            let candidate = &weights - &(&step * scale);
            let candidate_objective = penalized_loss(params.c, &design, &y, &candidate);
            if candidate_objective <= objective {
                weights = candidate;
                objective = candidate_objective;
                accepted = true;
                break;
            }
            scale *= 0.5;
        }
        if !accepted {
            converged = true;
            break;
        }
    }

    debug!(iterations, converged, objective, "Logistic regression fitted");

    Ok(LogisticModel {
        intercept: weights[0],
        coefficients: weights.slice(ndarray::s![1..]).to_owned(),
        iterations,
        converged,
    })
}

fn penalized_loss(c: f64, design: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> f64 {
    let logits = design.dot(weights);
    let loss: f64 = logits
        .iter()
        .zip(y.iter())
        .map(|(&z, &t)| softplus(z) - t * z)
        .sum();
    let penalty: f64 = weights.iter().skip(1).map(|w| w * w).sum();
    0.5 * penalty + c * loss
}

/// log(1 + e^z) without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_class_is_degenerate() {
        let x = array![[0.0], [1.0]];
        let result = fit(&LogisticParams::default(), &x, &[false, false]);
        assert!(matches!(result, Err(CampaignError::DegenerateInput(_))));
    }

    #[test]
    fn test_probabilities_follow_signal() {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = [false, false, true, false, true, false, true, true];
        let model = fit(&LogisticParams::default(), &x, &y).unwrap();

        assert!(model.converged);
        assert!(model.coefficients[0] > 0.0);
        let probs = model.predict_proba(&x);
        assert!(probs.iter().all(|p| *p > 0.0 && *p < 1.0));
        assert!(probs[0] < probs[7]);
    }

    #[test]
    fn test_separable_data_stays_finite() {
        let x = array![[-1.0], [-0.5], [0.5], [1.0]];
        let y = [false, false, true, true];
        let model = fit(&LogisticParams::default(), &x, &y).unwrap();
        assert!(model.coefficients[0].is_finite());
        assert!(model.iterations <= 500);
        let probs = model.predict_proba(&x);
        assert!(probs[3] > 0.5 && probs[0] < 0.5);
    }

    #[test]
    fn test_intercept_only_matches_base_rate() {
        let x = Array2::<f64>::zeros((4, 1));
        let model = fit(&LogisticParams::default(), &x, &[true, false, false, false]).unwrap();
        let probs = model.predict_proba(&x);
        for p in probs.iter() {
            assert!((p - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_solve_small_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
        assert!(solve(array![[1.0, 2.0], [2.0, 4.0]], array![1.0, 2.0]).is_none());
    }
}
