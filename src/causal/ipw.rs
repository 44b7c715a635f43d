//! Inverse Probability Weighting
//!
//! Horvitz-Thompson form of the ATE:
//! $\hat\tau = \frac{1}{n}\sum_i \frac{W_i Y_i}{e(X_i)} - \frac{(1-W_i) Y_i}{1-e(X_i)}$.
use crate::causal::EstimationContext;
use crate::config::ReplicatePolicy;
use crate::data::Dataset;
use crate::errors::AteError;
use log::debug;

/// Per-record weights `1 / e(x)` for treated and `1 / (1 - e(x))` for control.
pub fn ipw_weights(w: &[f64], p: &[f64]) -> Vec<f64> {
    w.iter()
        .zip(p)
        .map(|(wi, pi)| if *wi == 1.0 { 1.0 / pi } else { 1.0 / (1.0 - pi) })
        .collect()
}

/// Horvitz-Thompson ATE from outcomes, treatment and propensity scores.
pub fn ipw_ate(y: &[f64], w: &[f64], p: &[f64]) -> Result<f64, AteError> {
    if y.is_empty() {
        return Err(AteError::EmptyDataset);
    }
    let outside = p.iter().filter(|v| !(**v > 0.0 && **v < 1.0)).count();
    if outside > 0 {
        return Err(AteError::ExtremePropensity(outside, 0.0, 1.0));
    }
    let total: f64 = y
        .iter()
        .zip(w)
        .zip(p)
        .map(|((yi, wi), pi)| wi * yi / pi - (1.0 - wi) * yi / (1.0 - pi))
        .sum();
    Ok(total / y.len() as f64)
}

/// Records whose score lies strictly inside `bounds`.
///
/// With [`ReplicatePolicy::DiscardReplicate`] any record outside the bounds
/// is an error. With [`ReplicatePolicy::TrimRecords`] those records are left out
/// and the rest are returned.
pub fn overlap_indices(p: &[f64], bounds: (f64, f64), policy: ReplicatePolicy) -> Result<Vec<usize>, AteError> {
    let (lower, upper) = bounds;
    let kept: Vec<usize> = (0..p.len()).filter(|&i| p[i] > lower && p[i] < upper).collect();
    let outside = p.len() - kept.len();
    if outside > 0 {
        match policy {
            ReplicatePolicy::DiscardReplicate => return Err(AteError::ExtremePropensity(outside, lower, upper)),
            ReplicatePolicy::TrimRecords => debug!("Trimming {} records with extreme propensity scores.", outside),
        }
    }
    Ok(kept)
}

/// Fit the propensity model on `data`, apply the overlap policy and weight.
pub fn ipw_estimate(ctx: &EstimationContext, data: &Dataset, policy: ReplicatePolicy) -> Result<f64, AteError> {
    let design = ctx.encoder.transform(data)?;
    let matrix = design.matrix();
    let fitted = ctx.propensity_model().fit(&matrix, &data.treatment)?;
    let scores = fitted.predict(&matrix);
    let kept = overlap_indices(&scores, ctx.bounds, policy)?;

    let pick = |v: &[f64]| kept.iter().map(|&i| v[i]).collect::<Vec<f64>>();
    let (y, w, p) = (pick(&data.outcome), pick(&data.treatment), pick(&scores));
    if !w.iter().any(|v| *v == 1.0) {
        return Err(AteError::EmptyArm("treated"));
    }
    if !w.iter().any(|v| *v == 0.0) {
        return Err(AteError::EmptyArm("control"));
    }
    ipw_ate(&y, &w, &p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipw_constant_score() {
        // With e(x) = 0.5 the estimator is 2 * (sum_t y - sum_c y) / n.
        let y = vec![4.0, 2.0, 1.0, 1.0];
        let w = vec![1.0, 1.0, 0.0, 0.0];
        let p = vec![0.5; 4];
        let ate = ipw_ate(&y, &w, &p).unwrap();
        assert!((ate - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ipw_empty_input() {
        let err = ipw_ate(&[], &[], &[]).unwrap_err();
        assert!(matches!(err, AteError::EmptyDataset));
        assert!(!err.is_replicate_failure());
    }

    #[test]
    fn test_ipw_weights() {
        let weights = ipw_weights(&[1.0, 0.0], &[0.25, 0.25]);
        assert_eq!(weights, vec![4.0, 1.0 / 0.75]);
    }

    #[test]
    fn test_ipw_rejects_boundary_score() {
        let err = ipw_ate(&[1.0, 2.0], &[1.0, 0.0], &[1.0, 0.5]).unwrap_err();
        assert!(matches!(err, AteError::ExtremePropensity(1, _, _)));
    }

    #[test]
    fn test_overlap_policy() {
        let p = vec![0.005, 0.5, 0.995, 0.3];
        let err = overlap_indices(&p, (0.01, 0.99), ReplicatePolicy::DiscardReplicate).unwrap_err();
        assert!(matches!(err, AteError::ExtremePropensity(2, _, _)));
        let kept = overlap_indices(&p, (0.01, 0.99), ReplicatePolicy::TrimRecords).unwrap();
        assert_eq!(kept, vec![1, 3]);
    }

    #[test]
    fn test_bounds_are_open() {
        let kept = overlap_indices(&[0.01, 0.99, 0.5], (0.01, 0.99), ReplicatePolicy::TrimRecords).unwrap();
        assert_eq!(kept, vec![2]);
    }
}
