//! Propensity Model
//!
//! Logistic regression of the treatment indicator on the design matrix,
//! fitted by Newton-Raphson (iteratively reweighted least squares).
//!
//! $$ p(x) = P(W = 1 | X = x) = \frac{1}{1 + e^{-(\beta_0 + x'\beta)}} $$
use crate::config::SolverConfig;
use crate::constants::SEPARATION_EPS;
use crate::data::Matrix;
use crate::errors::AteError;
use crate::linalg::{add_ridge, cross, gram, linear_predictor, solve};
use log::debug;
use serde::{Deserialize, Serialize};

/// Logistic function clamped into the open unit interval.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let p = 1.0 / (1.0 + (-x).exp());
    p.clamp(f64::EPSILON, 1.0 - f64::EPSILON)
}

/// Unfitted logistic model: holds solver settings only.
#[derive(Debug, Clone, Copy)]
pub struct PropensityModel {
    pub solver: SolverConfig,
}

/// Coefficients of a fitted propensity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPropensity {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Newton iterations used.
    pub iterations: usize,
}

impl PropensityModel {
    pub fn new(solver: SolverConfig) -> Self {
        PropensityModel { solver }
    }

    /// Fit `P(W = 1 | X)`.
    ///
    /// * `x` - Design matrix, without an intercept column.
    /// * `w` - Treatment indicator, 0 or 1.
    ///
    /// Fails with `PerfectSeparation` once every fitted probability is within
    /// `SEPARATION_EPS` of the observed assignment, with `NotConverged` when the
    /// coefficient updates do not settle within `max_iterations`, and with
    /// `SingularMatrix` when the weighted Hessian cannot be inverted.
    pub fn fit(&self, x: &Matrix<f64>, w: &[f64]) -> Result<FittedPropensity, AteError> {
        let n_treated = w.iter().filter(|v| **v == 1.0).count();
        if n_treated == 0 {
            return Err(AteError::EmptyArm("treated"));
        }
        if n_treated == w.len() {
            return Err(AteError::EmptyArm("control"));
        }

        let share = n_treated as f64 / w.len() as f64;
        let mut beta = vec![0.0; x.cols + 1];
        beta[0] = (share / (1.0 - share)).ln();

        for iteration in 1..=self.solver.max_iterations {
            let eta = linear_predictor(x, beta[0], &beta[1..]);
            let p: Vec<f64> = eta.iter().map(|e| 1.0 / (1.0 + (-e).exp())).collect();
            let curvature: Vec<f64> = p.iter().map(|p_| p_ * (1.0 - p_)).collect();
            let residual: Vec<f64> = w.iter().zip(p.iter()).map(|(w_, p_)| w_ - p_).collect();
            if residual.iter().all(|r| r.abs() < SEPARATION_EPS) {
                return Err(AteError::PerfectSeparation(iteration));
            }

            let mut hessian = gram(x, Some(&curvature));
            add_ridge(&mut hessian, self.solver.l2_penalty);
            let mut gradient = cross(x, &residual);
            for (g, b) in gradient.iter_mut().zip(beta.iter()).skip(1) {
                *g -= self.solver.l2_penalty * b;
            }

            let step = solve(&hessian, &gradient)?;
            let mut max_step: f64 = 0.0;
            for (b, s) in beta.iter_mut().zip(step.iter()) {
                *b += s;
                max_step = max_step.max(s.abs());
            }
            if !beta.iter().all(|b| b.is_finite()) {
                return Err(AteError::NotConverged(iteration));
            }
            if max_step < self.solver.tolerance {
                debug!("Propensity model converged in {} iterations.", iteration);
                return Ok(FittedPropensity {
                    intercept: beta[0],
                    coefficients: beta[1..].to_vec(),
                    iterations: iteration,
                });
            }
        }
        Err(AteError::NotConverged(self.solver.max_iterations))
    }
}

impl FittedPropensity {
    /// Propensity scores for every row of `x`, each strictly inside (0, 1).
    pub fn predict(&self, x: &Matrix<f64>) -> Vec<f64> {
        linear_predictor(x, self.intercept, &self.coefficients)
            .into_iter()
            .map(sigmoid)
            .collect()
    }

    /// Propensity score of a single record.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let eta = self.intercept + self.coefficients.iter().zip(row).map(|(b, v)| b * v).sum::<f64>();
        sigmoid(eta)
    }
}
