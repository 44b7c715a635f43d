//! Bootstrap
//!
//! Nonparametric bootstrap over records. Each replicate draws `n` records with
//! replacement, refits the estimator from scratch and keeps the estimate if the
//! fit succeeded. Replicates that fail for data reasons (an empty arm, a
//! singular fit, extreme propensity scores, a non-finite result) are counted
//! and left out of the distribution; any other error aborts the run.
use crate::config::StudyConfig;
use crate::constants::{BOOTSTRAP_ITERATIONS, MIN_VALID_REPLICATES, SEED_MIX};
use crate::data::Dataset;
use crate::errors::AteError;
use crate::utils::{mean, percentiles, validate_float_parameter, variance};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Replicate resampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bootstrap {
    pub iterations: usize,
    pub seed: u64,
    /// Worker threads, all available cores when `None`.
    pub num_threads: Option<usize>,
    /// Fewer surviving replicates than this triggers a warning.
    pub min_valid: usize,
}

/// Why replicates were left out, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Singular system, non-convergence or perfect separation.
    pub fit_failure: usize,
    /// A resample with an empty arm or too few records for the split.
    pub degenerate: usize,
    pub extreme_propensity: usize,
    pub non_finite: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.fit_failure + self.degenerate + self.extreme_propensity + self.non_finite
    }

    fn record(&mut self, error: &AteError) {
        match error {
            AteError::SingularMatrix(..) | AteError::NotConverged(_) | AteError::PerfectSeparation(_) => {
                self.fit_failure += 1
            }
            AteError::EmptyArm(_) | AteError::DegenerateSplit(..) => self.degenerate += 1,
            AteError::ExtremePropensity(..) => self.extreme_propensity += 1,
            _ => self.non_finite += 1,
        }
    }
}

/// Estimates of the surviving replicates, in replicate order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapDistribution {
    pub estimates: Vec<f64>,
    pub requested: usize,
    pub skipped: SkipCounts,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Bootstrap {
            iterations: BOOTSTRAP_ITERATIONS,
            seed: 0,
            num_threads: None,
            min_valid: MIN_VALID_REPLICATES,
        }
    }
}

impl Bootstrap {
    pub fn new(iterations: usize, seed: u64) -> Self {
        Bootstrap {
            iterations,
            seed,
            ..Default::default()
        }
    }

    pub fn from_config(config: &StudyConfig) -> Self {
        Bootstrap {
            iterations: config.bootstrap_iterations,
            seed: config.seed,
            num_threads: config.num_threads,
            min_valid: config.min_valid_replicates,
        }
    }

    /// Random state of replicate `i`, independent of the order replicates run in.
    pub fn replicate_rng(&self, i: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (i as u64 + 1).wrapping_mul(SEED_MIX))
    }

    /// Draw `n` record indices uniformly with replacement.
    pub fn resample_indices(n: usize, rng: &mut StdRng) -> Vec<usize> {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }

    /// Run the estimator on every replicate.
    ///
    /// * `data` - The original dataset.
    /// * `estimator` - Refits the full estimator on a resample. Receives the
    ///   replicate's random state after the indices were drawn.
    pub fn run<F>(&self, data: &Dataset, estimator: F) -> Result<BootstrapDistribution, AteError>
    where
        F: Fn(&Dataset, &mut StdRng) -> Result<f64, AteError> + Sync,
    {
        if self.iterations == 0 {
            return Err(AteError::NoReplicates);
        }
        if data.is_empty() {
            return Err(AteError::EmptyDataset);
        }
        let num_threads = match self.num_threads {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| {
                AteError::InvalidParameter(
                    "num_threads".to_string(),
                    "a buildable thread pool".to_string(),
                    e.to_string(),
                )
            })?;

        debug!("Running {} bootstrap replicates on {} threads.", self.iterations, num_threads);
        let n = data.len();
        let outcomes: Vec<Result<f64, AteError>> = pool.install(|| {
            (0..self.iterations)
                .into_par_iter()
                .map(|i| {
                    let mut rng = self.replicate_rng(i);
                    let sample = data.subset(&Self::resample_indices(n, &mut rng));
                    estimator(&sample, &mut rng)
                })
                .collect()
        });

        let mut estimates = Vec::with_capacity(self.iterations);
        let mut skipped = SkipCounts::default();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(v) if v.is_finite() => estimates.push(v),
                Ok(v) => {
                    debug!("Skipping bootstrap replicate {}: non-finite estimate {}.", i, v);
                    skipped.non_finite += 1;
                }
                Err(e) if e.is_replicate_failure() => {
                    debug!("Skipping bootstrap replicate {}: {}", i, e);
                    skipped.record(&e);
                }
                Err(e) => return Err(e),
            }
        }

        if estimates.is_empty() {
            return Err(AteError::NoValidReplicates(self.iterations));
        }
        if skipped.total() > 0 {
            info!(
                "Bootstrap kept {} of {} replicates ({} fit failures, {} degenerate, {} extreme propensity, {} non-finite).",
                estimates.len(),
                self.iterations,
                skipped.fit_failure,
                skipped.degenerate,
                skipped.extreme_propensity,
                skipped.non_finite
            );
        }
        if estimates.len() < self.min_valid {
            warn!(
                "Only {} valid bootstrap replicates, fewer than {}. The interval may be unreliable.",
                estimates.len(),
                self.min_valid
            );
        }
        Ok(BootstrapDistribution {
            estimates,
            requested: self.iterations,
            skipped,
        })
    }
}

impl BootstrapDistribution {
    pub fn n_valid(&self) -> usize {
        self.estimates.len()
    }

    /// Percentile interval at `level`, from the `(1 - level) / 2` and
    /// `(1 + level) / 2` empirical quantiles.
    pub fn percentile_interval(&self, level: f64) -> Result<(f64, f64), AteError> {
        validate_float_parameter(level, 0.0, 1.0, "confidence_level")?;
        let alpha = (1.0 - level) / 2.0;
        let weights = vec![1.0; self.estimates.len()];
        let bounds = percentiles(&self.estimates, &weights, &[alpha, 1.0 - alpha]);
        Ok((bounds[0], bounds[1]))
    }

    /// Standard deviation of the replicate estimates.
    pub fn std_error(&self) -> f64 {
        variance(&self.estimates).sqrt()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.estimates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data(n: usize) -> Dataset {
        let outcome: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let treatment: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        Dataset::new(outcome, treatment, vec!["X1".to_string()], vec![vec![0.0; n]]).unwrap()
    }

    fn sample_mean(data: &Dataset, _: &mut StdRng) -> Result<f64, AteError> {
        Ok(mean(&data.outcome))
    }

    #[test]
    fn test_no_replicates() {
        let err = Bootstrap::new(0, 1).run(&toy_data(10), sample_mean).unwrap_err();
        assert!(matches!(err, AteError::NoReplicates));
    }

    #[test]
    fn test_empty_dataset() {
        let data = Dataset::new(vec![], vec![], vec![], vec![]).unwrap();
        let err = Bootstrap::new(5, 1).run(&data, sample_mean).unwrap_err();
        assert!(matches!(err, AteError::EmptyDataset));
    }

    #[test]
    fn test_too_few_valid_replicates() {
        // Only replicates whose mean lands in a narrow window survive.
        let data = toy_data(20);
        let engine = Bootstrap {
            min_valid: 20,
            ..Bootstrap::new(30, 3)
        };
        let dist = engine
            .run(&data, |sample, _| {
                let m = mean(&sample.outcome);
                if (m - 9.5).abs() < 0.6 {
                    Ok(m)
                } else {
                    Err(AteError::ExtremePropensity(1, 0.01, 0.99))
                }
            })
            .unwrap();
        assert!(dist.n_valid() > 0);
        assert!(dist.n_valid() < engine.min_valid);
        assert_eq!(dist.n_valid() + dist.skipped.extreme_propensity, 30);
        let (lower, upper) = dist.percentile_interval(0.95).unwrap();
        assert!(lower <= upper);
    }

    #[test]
    fn test_all_replicates_fail() {
        let err = Bootstrap::new(5, 1)
            .run(&toy_data(10), |_, _| Err(AteError::NotConverged(50)))
            .unwrap_err();
        assert!(matches!(err, AteError::NoValidReplicates(5)));
    }

    #[test]
    fn test_fatal_error_aborts() {
        let err = Bootstrap::new(5, 1)
            .run(&toy_data(10), |_, _| Err(AteError::MissingColumn("Y".to_string())))
            .unwrap_err();
        assert!(matches!(err, AteError::MissingColumn(_)));
    }

    #[test]
    fn test_deterministic_across_threads() {
        let data = toy_data(50);
        let one = Bootstrap {
            num_threads: Some(1),
            ..Bootstrap::new(40, 7)
        }
        .run(&data, sample_mean)
        .unwrap();
        let four = Bootstrap {
            num_threads: Some(4),
            ..Bootstrap::new(40, 7)
        }
        .run(&data, sample_mean)
        .unwrap();
        assert_eq!(one, four);
        assert_eq!(one.n_valid(), 40);
        let other_seed = Bootstrap::new(40, 8).run(&data, sample_mean).unwrap();
        assert_ne!(one.estimates, other_seed.estimates);
    }

    #[test]
    fn test_skipped_replicates() {
        let data = toy_data(20);
        let dist = Bootstrap::new(30, 3)
            .run(&data, |sample, _| {
                let m = mean(&sample.outcome);
                if m > 9.5 {
                    Err(AteError::ExtremePropensity(1, 0.01, 0.99))
                } else if m < 8.0 {
                    Ok(f64::NAN)
                } else {
                    Ok(m)
                }
            })
            .unwrap();
        assert_eq!(dist.n_valid() + dist.skipped.total(), dist.requested);
        assert!(dist.skipped.extreme_propensity > 0);
        assert!(dist.estimates.iter().all(|v| v.is_finite() && *v >= 8.0 && *v <= 9.5));
    }

    #[test]
    fn test_percentile_interval() {
        let dist = BootstrapDistribution {
            estimates: (1..101).map(|i| i as f64).collect(),
            requested: 100,
            skipped: SkipCounts::default(),
        };
        let (lower, upper) = dist.percentile_interval(0.95).unwrap();
        assert_eq!((lower, upper), (3.0, 98.0));
        assert!(dist.percentile_interval(1.5).is_err());
        assert!((dist.mean() - 50.5).abs() < 1e-12);
    }

    #[test]
    fn test_resample_covers_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let idx = Bootstrap::resample_indices(25, &mut rng);
        assert_eq!(idx.len(), 25);
        assert!(idx.iter().all(|i| *i < 25));
    }
}
