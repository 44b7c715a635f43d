//! Causal
//!
//! Estimators of the Average Treatment Effect (ATE): the unadjusted difference
//! in means, regression adjustment, inverse probability weighting (IPW) and
//! augmented IPW (doubly robust). Every estimator is reachable through
//! [`Method::estimate`], which has the same shape for all four so that the
//! bootstrap can treat them uniformly.
pub mod adjustment;
pub mod aipw;
pub mod ipw;
pub mod naive;


use crate::config::{ReplicatePolicy, SolverConfig, StudyConfig};
use crate::data::Dataset;
use crate::encoding::FeatureEncoder;
use crate::errors::AteError;
use crate::propensity::PropensityModel;
use crate::regression::OutcomeModel;
use crate::utils::items_to_strings;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;
use std::str::FromStr;

/// ATE estimation method.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Method {
    /// Difference of arm means, no covariates.
    Unadjusted,
    /// Treatment coefficient of an OLS fit on treatment and covariates.
    Regression,
    /// Inverse probability weighting.
    Ipw,
    /// Augmented inverse probability weighting.
    Aipw,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Unadjusted, Method::Regression, Method::Ipw, Method::Aipw];

    pub fn label(&self) -> &'static str {
        match self {
            Method::Unadjusted => "Unadjusted difference",
            Method::Regression => "Regression adjustment",
            Method::Ipw => "IPW",
            Method::Aipw => "AIPW (doubly robust)",
        }
    }

    /// Point estimate on `data`.
    ///
    /// * `ctx` - Shared encoder and model settings.
    /// * `data` - The original dataset or a bootstrap resample.
    /// * `rng` - Source for the AIPW fit/estimate split.
    /// * `policy` - Handling of propensity scores outside the bounds.
    pub fn estimate(
        &self,
        ctx: &EstimationContext,
        data: &Dataset,
        rng: &mut StdRng,
        policy: ReplicatePolicy,
    ) -> Result<f64, AteError> {
        let value = match self {
            Method::Unadjusted => naive::difference_in_means(&data.outcome, &data.treatment)?.estimate,
            Method::Regression => {
                let design = ctx.encoder.transform(data)?;
                adjustment::regression_adjusted(&design, &data.outcome, &data.treatment, ctx.solver.l2_penalty)?
                    .estimate
            }
            Method::Ipw => ipw::ipw_estimate(ctx, data, policy)?,
            Method::Aipw => aipw::aipw_estimate(ctx, data, rng, policy)?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(AteError::NonFinite(self.label().to_string()))
        }
    }

    /// Estimate with its closed-form standard error, for the methods that have one.
    pub fn analytic(&self, ctx: &EstimationContext, data: &Dataset) -> Result<Option<AnalyticEstimate>, AteError> {
        match self {
            Method::Unadjusted => naive::difference_in_means(&data.outcome, &data.treatment).map(Some),
            Method::Regression => {
                let design = ctx.encoder.transform(data)?;
                adjustment::regression_adjusted(&design, &data.outcome, &data.treatment, ctx.solver.l2_penalty)
                    .map(Some)
            }
            Method::Ipw | Method::Aipw => Ok(None),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Method {
    type Err = AteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unadjusted" => Ok(Method::Unadjusted),
            "Regression" => Ok(Method::Regression),
            "Ipw" | "IPW" => Ok(Method::Ipw),
            "Aipw" | "AIPW" => Ok(Method::Aipw),
            _ => Err(AteError::InvalidParameter(
                "method".to_string(),
                items_to_strings(vec!["Unadjusted", "Regression", "Ipw", "Aipw"]),
                s.to_string(),
            )),
        }
    }
}

/// Point estimate with a closed-form standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticEstimate {
    pub estimate: f64,
    pub std_error: f64,
}

impl AnalyticEstimate {
    /// Two-sided normal interval at `level`.
    pub fn interval(&self, level: f64) -> Result<(f64, f64), AteError> {
        let normal = Normal::new(0.0, 1.0).map_err(|e| {
            AteError::InvalidParameter("normal".to_string(), "a standard normal".to_string(), e.to_string())
        })?;
        let z = normal.inverse_cdf(0.5 + level / 2.0);
        Ok((self.estimate - z * self.std_error, self.estimate + z * self.std_error))
    }
}

/// Everything an estimator needs besides the data: the shared covariate
/// encoding, solver settings, propensity bounds and the AIPW split share.
#[derive(Debug, Clone)]
pub struct EstimationContext {
    pub encoder: FeatureEncoder,
    pub solver: SolverConfig,
    pub bounds: (f64, f64),
    pub fit_fraction: f64,
}

impl EstimationContext {
    pub fn new(encoder: FeatureEncoder, config: &StudyConfig) -> Self {
        EstimationContext {
            encoder,
            solver: config.solver,
            bounds: config.propensity_bounds,
            fit_fraction: config.fit_fraction,
        }
    }

    pub fn propensity_model(&self) -> PropensityModel {
        PropensityModel::new(self.solver)
    }

    pub fn outcome_model(&self) -> OutcomeModel {
        OutcomeModel::new(self.solver.l2_penalty)
    }
}
