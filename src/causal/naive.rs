//! Unadjusted difference in means, with the Welch standard error.
use crate::causal::AnalyticEstimate;
use crate::data::split_by_arm;
use crate::errors::AteError;
use crate::utils::{mean, variance};

/// `mean(Y | W = 1) - mean(Y | W = 0)`.
pub fn difference_in_means(y: &[f64], w: &[f64]) -> Result<AnalyticEstimate, AteError> {
    let (treated, control) = split_by_arm(y, w);
    if treated.is_empty() {
        return Err(AteError::EmptyArm("treated"));
    }
    if control.is_empty() {
        return Err(AteError::EmptyArm("control"));
    }
    let estimate = mean(&treated) - mean(&control);
    let std_error = (variance(&treated) / treated.len() as f64 + variance(&control) / control.len() as f64).sqrt();
    Ok(AnalyticEstimate { estimate, std_error })
}
