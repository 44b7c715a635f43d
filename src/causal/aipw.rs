//! Augmented Inverse Probability Weighting
//!
//! Doubly robust ATE. The propensity model is fit on the whole (re)sample; the
//! per-arm outcome models are fit on a random `fit_fraction` share of it and the
//! estimate is formed on the remaining records:
//!
//! $\hat\mu_1 = \overline{m_1(X)} + \overline{W (Y - m_1(X)) / e(X)}$,
//! $\hat\mu_0 = \overline{m_0(X)} + \overline{(1 - W) (Y - m_0(X)) / (1 - e(X))}$,
//! $\hat\tau = \hat\mu_1 - \hat\mu_0$.
use crate::causal::ipw::overlap_indices;
use crate::causal::EstimationContext;
use crate::config::ReplicatePolicy;
use crate::data::Dataset;
use crate::errors::AteError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Doubly robust combination of outcome predictions and inverse weights.
///
/// * `y` - Observed outcomes.
/// * `w` - Treatment indicators.
/// * `p` - Propensity scores, strictly inside (0, 1).
/// * `mu1` - Predicted outcome under treatment.
/// * `mu0` - Predicted outcome under control.
pub fn aipw_ate(y: &[f64], w: &[f64], p: &[f64], mu1: &[f64], mu0: &[f64]) -> f64 {
    let n = y.len() as f64;
    let (mut treated, mut control) = (0.0, 0.0);
    for i in 0..y.len() {
        treated += mu1[i] + w[i] * (y[i] - mu1[i]) / p[i];
        control += mu0[i] + (1.0 - w[i]) * (y[i] - mu0[i]) / (1.0 - p[i]);
    }
    (treated - control) / n
}

/// Split `indices` at random into a fitting part of `fraction` of the records
/// and an estimation part holding the rest.
pub fn split_indices(indices: &[usize], fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = indices.to_vec();
    shuffled.shuffle(rng);
    let n_fit = ((shuffled.len() as f64) * fraction).round() as usize;
    let estimate = shuffled.split_off(n_fit.min(shuffled.len()));
    (shuffled, estimate)
}

pub fn aipw_estimate(
    ctx: &EstimationContext,
    data: &Dataset,
    rng: &mut StdRng,
    policy: ReplicatePolicy,
) -> Result<f64, AteError> {
    let design = ctx.encoder.transform(data)?;
    let fitted = ctx.propensity_model().fit(&design.matrix(), &data.treatment)?;
    let scores = fitted.predict(&design.matrix());
    let kept = overlap_indices(&scores, ctx.bounds, policy)?;

    let (fit_idx, est_idx) = split_indices(&kept, ctx.fit_fraction, rng);
    if est_idx.is_empty() {
        return Err(AteError::DegenerateSplit(0, 1));
    }
    let pick = |v: &[f64], idx: &[usize]| idx.iter().map(|&i| v[i]).collect::<Vec<f64>>();
    let outcome = ctx.outcome_model().fit(
        &design.select_rows(&fit_idx),
        &pick(&data.outcome, &fit_idx),
        &pick(&data.treatment, &fit_idx),
    )?;

    let est_design = design.select_rows(&est_idx);
    let est_matrix = est_design.matrix();
    let mu1 = outcome.predict_treated(&est_matrix);
    let mu0 = outcome.predict_control(&est_matrix);
    Ok(aipw_ate(
        &pick(&data.outcome, &est_idx),
        &pick(&data.treatment, &est_idx),
        &pick(&scores, &est_idx),
        &mu1,
        &mu0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_perfect_outcome_model() {
        // When m_a(x) matches Y exactly the residual terms vanish.
        let y = vec![3.0, 1.0, 4.0, 2.0];
        let w = vec![1.0, 0.0, 1.0, 0.0];
        let p = vec![0.3, 0.6, 0.7, 0.2];
        let mu1 = vec![3.0, 2.0, 4.0, 3.0];
        let mu0 = vec![2.0, 1.0, 3.0, 2.0];
        assert!((aipw_ate(&y, &w, &p, &mu1, &mu0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_outcome_model_is_ipw() {
        let y = vec![4.0, 2.0, 1.0, 1.0];
        let w = vec![1.0, 1.0, 0.0, 0.0];
        let p = vec![0.5; 4];
        let zeros = vec![0.0; 4];
        assert!((aipw_ate(&y, &w, &p, &zeros, &zeros) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_split_indices() {
        let mut rng = StdRng::seed_from_u64(3);
        let indices: Vec<usize> = (0..11).collect();
        let (fit, est) = split_indices(&indices, 0.5, &mut rng);
        assert_eq!(fit.len(), 6);
        assert_eq!(est.len(), 5);
        let mut all: Vec<usize> = fit.iter().chain(est.iter()).copied().collect();
        all.sort();
        assert_eq!(all, indices);
    }
}
