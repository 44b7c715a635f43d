//! Simulate
//!
//! Synthetic student records with the same column layout as the mindset study,
//! a known treatment effect and tunable confounding. Used by the `simulate`
//! subcommand, the benchmarks and the estimator tests.
use crate::config::ColumnSpec;
use crate::data::Dataset;
use crate::errors::AteError;
use crate::propensity::sigmoid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Parameters of the data generating process.
///
/// Treatment is assigned by a logistic model in `S3`, `X1`, `X2` and `C3`
/// scaled by `confounding`; the outcome is linear in the covariates plus
/// `effect * Z` and Gaussian noise. Both nuisance models are therefore
/// correctly specified by the estimators in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticStudy {
    pub rows: usize,
    /// True average treatment effect.
    pub effect: f64,
    pub seed: u64,
    /// Multiplier on the covariate terms of the assignment model. Zero gives a randomized trial.
    pub confounding: f64,
    /// Standard deviation of the outcome noise.
    pub noise: f64,
}

impl Default for SyntheticStudy {
    fn default() -> Self {
        SyntheticStudy {
            rows: 1000,
            effect: 0.0,
            seed: 0,
            confounding: 1.0,
            noise: 1.0,
        }
    }
}

impl SyntheticStudy {
    pub fn new(rows: usize, effect: f64, seed: u64) -> Self {
        SyntheticStudy {
            rows,
            effect,
            seed,
            ..Default::default()
        }
    }

    /// Generate the records, in the covariate order of [`ColumnSpec::mindset`].
    pub fn generate(&self) -> Result<Dataset, AteError> {
        self.generate_with_propensity().map(|(data, _)| data)
    }

    /// Generate the records together with the true propensity score of each one.
    pub fn generate_with_propensity(&self) -> Result<(Dataset, Vec<f64>), AteError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let spec = ColumnSpec::mindset();
        let names = spec.covariate_names();
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(self.rows); names.len()];
        let mut outcome = Vec::with_capacity(self.rows);
        let mut treatment = Vec::with_capacity(self.rows);
        let mut scores = Vec::with_capacity(self.rows);

        for _ in 0..self.rows {
            let s3: f64 = rng.sample(StandardNormal);
            let c1 = rng.gen_range(1..=4) as f64;
            let c2 = if rng.gen::<f64>() < 0.5 { 1.0 } else { 0.0 };
            let c3 = if rng.gen::<f64>() < 0.4 { 1.0 } else { 0.0 };
            let xc = rng.gen_range(0..=4) as f64;
            let x: Vec<f64> = (0..5).map(|_| rng.sample(StandardNormal)).collect();

            let logit = -0.2 + self.confounding * (0.6 * s3 + 0.4 * x[0] - 0.3 * x[1] + 0.3 * c3);
            let p = sigmoid(logit);
            let z = if rng.gen::<f64>() < p { 1.0 } else { 0.0 };
            let noise: f64 = rng.sample(StandardNormal);
            let y = 0.8 * s3 + 0.5 * x[0] + 0.3 * x[1] - 0.2 * x[3] + 0.4 * c3 - 0.2 * c2
                + 0.15 * (c1 - 1.0)
                + 0.1 * xc
                + self.effect * z
                + self.noise * noise;

            let row = [s3, c1, c2, c3, xc, x[0], x[1], x[2], x[3], x[4]];
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
            outcome.push(y);
            treatment.push(z);
            scores.push(p);
        }

        let data = Dataset::new(outcome, treatment, names, columns)?;
        Ok((data, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_reproducible() {
        let a = SyntheticStudy::new(200, 2.0, 11).generate().unwrap();
        let b = SyntheticStudy::new(200, 2.0, 11).generate().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_eq!(a.covariate_names, ColumnSpec::mindset().covariate_names());
        assert!(a.n_treated() > 0 && a.n_control() > 0);
    }

    #[test]
    fn test_confounding_shifts_s3() {
        let data = SyntheticStudy::new(2000, 0.0, 5).generate().unwrap();
        let (treated, control) = data.covariate_by_arm("S3").unwrap();
        let diff = crate::utils::mean(&treated) - crate::utils::mean(&control);
        assert!(diff > 0.3, "difference {}", diff);
    }

    #[test]
    fn test_randomized_design() {
        let study = SyntheticStudy {
            confounding: 0.0,
            ..SyntheticStudy::new(500, 1.0, 2)
        };
        let (_, scores) = study.generate_with_propensity().unwrap();
        assert!(scores.iter().all(|p| (p - sigmoid(-0.2)).abs() < 1e-12));
    }
}
