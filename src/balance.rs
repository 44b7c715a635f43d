//! Balance
//!
//! Covariate balance before and after inverse probability weighting, and a
//! summary of propensity score overlap between the arms.
use crate::constants::SD_EPS;
use crate::encoding::DesignMatrix;
use crate::errors::AteError;
use crate::utils::{weighted_mean, weighted_variance};
use serde::{Deserialize, Serialize};

/// Balance of a single design column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateBalance {
    pub name: String,
    pub mean_treated: f64,
    pub mean_control: f64,
    pub smd_unweighted: f64,
    pub weighted_mean_treated: f64,
    pub weighted_mean_control: f64,
    pub smd_weighted: f64,
}

/// Standardized mean differences of every design column, unweighted and IPW-weighted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceDiagnostic {
    pub covariates: Vec<CovariateBalance>,
}

/// Weighted arm means and the standardized mean difference
/// `(m_t - m_c) / sqrt((s2_t + s2_c) / 2)`.
///
/// Returns `(m_t, m_c, smd)`. A column that is constant within both arms has
/// an SMD of zero when the means agree and an infinite one otherwise.
pub fn standardized_mean_difference(values: &[f64], w: &[f64], weights: &[f64]) -> (f64, f64, f64) {
    let (mut xt, mut wt, mut xc, mut wc) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for i in 0..values.len() {
        if w[i] == 1.0 {
            xt.push(values[i]);
            wt.push(weights[i]);
        } else {
            xc.push(values[i]);
            wc.push(weights[i]);
        }
    }
    let (mt, mc) = (weighted_mean(&xt, &wt), weighted_mean(&xc, &wc));
    let pooled = ((weighted_variance(&xt, &wt) + weighted_variance(&xc, &wc)) / 2.0).sqrt();
    let diff = mt - mc;
    let smd = if pooled > SD_EPS {
        diff / pooled
    } else if diff.abs() > SD_EPS {
        diff.signum() * f64::INFINITY
    } else {
        0.0
    };
    (mt, mc, smd)
}

impl BalanceDiagnostic {
    /// * `design` - Encoded covariates.
    /// * `w` - Treatment indicators.
    /// * `weights` - Inverse probability weights, one per record.
    pub fn compute(design: &DesignMatrix, w: &[f64], weights: &[f64]) -> Result<Self, AteError> {
        if w.len() != design.rows {
            return Err(AteError::LengthMismatch("treatment".to_string(), w.len(), design.rows));
        }
        if weights.len() != design.rows {
            return Err(AteError::LengthMismatch("weights".to_string(), weights.len(), design.rows));
        }
        let ones = vec![1.0; design.rows];
        let covariates = (0..design.cols)
            .map(|j| {
                let column = design.column(j);
                let (mean_treated, mean_control, smd_unweighted) = standardized_mean_difference(column, w, &ones);
                let (weighted_mean_treated, weighted_mean_control, smd_weighted) =
                    standardized_mean_difference(column, w, weights);
                CovariateBalance {
                    name: design.names[j].clone(),
                    mean_treated,
                    mean_control,
                    smd_unweighted,
                    weighted_mean_treated,
                    weighted_mean_control,
                    smd_weighted,
                }
            })
            .collect();
        Ok(BalanceDiagnostic { covariates })
    }

    pub fn max_abs_smd_unweighted(&self) -> f64 {
        self.covariates.iter().map(|c| c.smd_unweighted.abs()).fold(0.0, f64::max)
    }

    pub fn max_abs_smd_weighted(&self) -> f64 {
        self.covariates.iter().map(|c| c.smd_weighted.abs()).fold(0.0, f64::max)
    }

    /// Columns whose weighted |SMD| exceeds `threshold` (0.1 is the usual rule of thumb).
    pub fn imbalanced(&self, threshold: f64) -> Vec<&CovariateBalance> {
        self.covariates
            .iter()
            .filter(|c| c.smd_weighted.abs() > threshold)
            .collect()
    }
}

/// Kish effective sample size `(sum w)^2 / sum w^2`.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum: f64 = weights.iter().sum();
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 0.0 {
        sum * sum / sum_sq
    } else {
        0.0
    }
}

/// Range of propensity scores per arm and the weighting cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapSummary {
    pub min_treated: f64,
    pub max_treated: f64,
    pub min_control: f64,
    pub max_control: f64,
    /// Records at or below the lower bound.
    pub below_lower: usize,
    /// Records at or above the upper bound.
    pub above_upper: usize,
    pub ess_treated: f64,
    pub ess_control: f64,
}

impl OverlapSummary {
    pub fn compute(scores: &[f64], w: &[f64], weights: &[f64], bounds: (f64, f64)) -> Self {
        let mut summary = OverlapSummary {
            min_treated: f64::INFINITY,
            max_treated: f64::NEG_INFINITY,
            min_control: f64::INFINITY,
            max_control: f64::NEG_INFINITY,
            below_lower: 0,
            above_upper: 0,
            ess_treated: 0.0,
            ess_control: 0.0,
        };
        let (mut wt, mut wc) = (Vec::new(), Vec::new());
        for i in 0..scores.len() {
            let p = scores[i];
            if w[i] == 1.0 {
                summary.min_treated = summary.min_treated.min(p);
                summary.max_treated = summary.max_treated.max(p);
                wt.push(weights[i]);
            } else {
                summary.min_control = summary.min_control.min(p);
                summary.max_control = summary.max_control.max(p);
                wc.push(weights[i]);
            }
            if p <= bounds.0 {
                summary.below_lower += 1;
            } else if p >= bounds.1 {
                summary.above_upper += 1;
            }
        }
        summary.ess_treated = effective_sample_size(&wt);
        summary.ess_control = effective_sample_size(&wc);
        summary
    }

    pub fn n_outside(&self) -> usize {
        self.below_lower + self.above_upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::ipw::ipw_weights;
    use crate::config::ColumnSpec;
    use crate::encoding::FeatureEncoder;
    use crate::simulate::SyntheticStudy;

    #[test]
    fn test_smd_simple() {
        // Treated 1, 3: mean 2, var 1. Control 0, 2: mean 1, var 1.
        let (mt, mc, smd) = standardized_mean_difference(&[1.0, 3.0, 0.0, 2.0], &[1.0, 1.0, 0.0, 0.0], &[1.0; 4]);
        assert_eq!((mt, mc), (2.0, 1.0));
        assert!((smd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_smd_constant_column() {
        let (_, _, smd) = standardized_mean_difference(&[1.0, 1.0, 1.0], &[1.0, 0.0, 0.0], &[1.0; 3]);
        assert_eq!(smd, 0.0);
        let (_, _, smd) = standardized_mean_difference(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[1.0; 3]);
        assert_eq!(smd, f64::INFINITY);
    }

    #[test]
    fn test_true_weights_reduce_imbalance() {
        let (data, scores) = SyntheticStudy::new(5000, 1.0, 12).generate_with_propensity().unwrap();
        let design = FeatureEncoder::fit(&ColumnSpec::mindset(), &data)
            .unwrap()
            .transform(&data)
            .unwrap();
        let weights = ipw_weights(&data.treatment, &scores);
        let balance = BalanceDiagnostic::compute(&design, &data.treatment, &weights).unwrap();
        let s3 = balance.covariates.iter().find(|c| c.name == "S3").unwrap();
        assert!(s3.smd_unweighted > 0.3);
        for c in balance.covariates.iter().filter(|c| c.smd_unweighted.abs() > 0.1) {
            assert!(c.smd_weighted.abs() < c.smd_unweighted.abs(), "{:?}", c);
        }
        assert!(balance.max_abs_smd_weighted() < balance.max_abs_smd_unweighted());
    }

    #[test]
    fn test_length_mismatch() {
        let design = DesignMatrix {
            values: vec![0.0, 1.0],
            rows: 2,
            cols: 1,
            names: vec!["X1".to_string()],
        };
        let err = BalanceDiagnostic::compute(&design, &[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(err, AteError::LengthMismatch(..)));
    }

    #[test]
    fn test_overlap_summary() {
        let scores = vec![0.2, 0.995, 0.4, 0.005];
        let w = vec![1.0, 1.0, 0.0, 0.0];
        let weights = ipw_weights(&w, &scores);
        let summary = OverlapSummary::compute(&scores, &w, &weights, (0.01, 0.99));
        assert_eq!((summary.min_treated, summary.max_treated), (0.2, 0.995));
        assert_eq!((summary.min_control, summary.max_control), (0.005, 0.4));
        assert_eq!(summary.n_outside(), 2);
        assert!(summary.ess_treated >= 1.0 && summary.ess_treated <= 2.0);
    }

    #[test]
    fn test_effective_sample_size() {
        assert!((effective_sample_size(&[1.0; 10]) - 10.0).abs() < 1e-12);
        assert!((effective_sample_size(&[1.0, 0.0]) - 1.0).abs() < 1e-12);
    }
}
