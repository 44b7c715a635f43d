//! Study
//!
//! End-to-end analysis: encode covariates, fit the propensity model for the
//! diagnostics, then estimate the ATE with every configured method and attach
//! an interval to each.
use crate::balance::{BalanceDiagnostic, OverlapSummary};
use crate::bootstrap::Bootstrap;
use crate::causal::ipw::ipw_weights;
use crate::causal::{EstimationContext, Method};
use crate::config::{ReplicatePolicy, StudyConfig};
use crate::data::Dataset;
use crate::encoding::FeatureEncoder;
use crate::errors::AteError;
use crate::report::{AnalysisReport, EstimateResult, IntervalKind};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

/// A configured analysis.
#[derive(Debug, Clone)]
pub struct Study {
    pub config: StudyConfig,
}

impl Study {
    /// Validate the configuration and create a study.
    pub fn new(config: StudyConfig) -> Result<Self, AteError> {
        config.validate()?;
        Ok(Study { config })
    }

    /// Read the configured columns from a delimited file.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Dataset, AteError> {
        let data = Dataset::from_csv(path, &self.config.columns, self.config.delimiter_byte())?;
        info!(
            "Loaded {} records ({} treated, {} control).",
            data.len(),
            data.n_treated(),
            data.n_control()
        );
        Ok(data)
    }

    pub fn run(&self, data: &Dataset) -> Result<AnalysisReport, AteError> {
        if data.is_empty() {
            return Err(AteError::EmptyDataset);
        }
        if data.n_treated() == 0 {
            return Err(AteError::EmptyArm("treated"));
        }
        if data.n_control() == 0 {
            return Err(AteError::EmptyArm("control"));
        }
        let ctx = EstimationContext::new(FeatureEncoder::fit(&self.config.columns, data)?, &self.config);
        info!(
            "Encoded {} covariates into {} design columns.",
            self.config.columns.covariates.len(),
            ctx.encoder.n_features()
        );

        let (balance, overlap, scores, weights) = match self.diagnostics(&ctx, data) {
            Ok((balance, overlap, scores, weights)) => (Some(balance), Some(overlap), scores, weights),
            Err(e) if e.is_replicate_failure() && !self.uses_weighting() => {
                warn!("Propensity model failed on the full data ({}), skipping balance and overlap diagnostics.", e);
                (None, None, Vec::new(), Vec::new())
            }
            Err(e) => return Err(e),
        };

        let bootstrap = Bootstrap::from_config(&self.config);
        let estimates = self
            .config
            .methods
            .iter()
            .map(|method| self.estimate_method(*method, &ctx, data, &bootstrap))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AnalysisReport {
            n_records: data.len(),
            n_treated: data.n_treated(),
            n_control: data.n_control(),
            confidence_level: self.config.confidence_level,
            estimates,
            balance,
            overlap,
            propensity: scores,
            weights,
        })
    }

    fn uses_weighting(&self) -> bool {
        self.config.methods.iter().any(|m| matches!(m, Method::Ipw | Method::Aipw))
    }

    /// Full-data propensity scores, their weights, and the balance and overlap they imply.
    fn diagnostics(
        &self,
        ctx: &EstimationContext,
        data: &Dataset,
    ) -> Result<(BalanceDiagnostic, OverlapSummary, Vec<f64>, Vec<f64>), AteError> {
        let design = ctx.encoder.transform(data)?;
        let fitted = ctx.propensity_model().fit(&design.matrix(), &data.treatment)?;
        let scores = fitted.predict(&design.matrix());
        let weights = ipw_weights(&data.treatment, &scores);
        let balance = BalanceDiagnostic::compute(&design, &data.treatment, &weights)?;
        let overlap = OverlapSummary::compute(&scores, &data.treatment, &weights, ctx.bounds);
        if overlap.n_outside() > 0 {
            warn!(
                "{} records have propensity scores outside ({}, {}) and are trimmed from the weighting estimates.",
                overlap.n_outside(),
                ctx.bounds.0,
                ctx.bounds.1
            );
        }
        Ok((balance, overlap, scores, weights))
    }

    fn estimate_method(
        &self,
        method: Method,
        ctx: &EstimationContext,
        data: &Dataset,
        bootstrap: &Bootstrap,
    ) -> Result<EstimateResult, AteError> {
        let level = self.config.confidence_level;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let estimate = method.estimate(ctx, data, &mut rng, ReplicatePolicy::TrimRecords)?;

        if self.config.analytic_intervals {
            if let Some(analytic) = method.analytic(ctx, data)? {
                let (ci_lower, ci_upper) = analytic.interval(level)?;
                info!("{}: {:.4} [{:.4}, {:.4}] (analytic)", method, estimate, ci_lower, ci_upper);
                return Ok(EstimateResult {
                    method,
                    estimate,
                    ci_lower,
                    ci_upper,
                    interval: IntervalKind::Analytic,
                    std_error: analytic.std_error,
                    replicates: None,
                    skipped: Default::default(),
                    low_replicates: false,
                    draws: Vec::new(),
                });
            }
        }

        let policy = self.config.replicate_policy;
        let distribution = bootstrap.run(data, |sample, rng| method.estimate(ctx, sample, rng, policy))?;
        let (ci_lower, ci_upper) = distribution.percentile_interval(level)?;
        info!(
            "{}: {:.4} [{:.4}, {:.4}] from {} of {} replicates",
            method,
            estimate,
            ci_lower,
            ci_upper,
            distribution.n_valid(),
            distribution.requested
        );
        Ok(EstimateResult {
            method,
            estimate,
            ci_lower,
            ci_upper,
            interval: IntervalKind::Bootstrap,
            std_error: distribution.std_error(),
            replicates: Some(distribution.n_valid()),
            skipped: distribution.skipped,
            low_replicates: distribution.n_valid() < bootstrap.min_valid,
            draws: distribution.estimates,
        })
    }
}
