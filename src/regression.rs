//! Regression
//!
//! Ordinary least squares with a light ridge on the slopes, and the per-arm
//! outcome model used for counterfactual predictions.
use crate::data::{split_by_arm, Matrix};
use crate::encoding::DesignMatrix;
use crate::errors::AteError;
use crate::linalg::{add_ridge, cross, gram, invert, linear_predictor};
use serde::{Deserialize, Serialize};

/// Unfitted least-squares model.
#[derive(Debug, Clone, Copy)]
pub struct LinearRegression {
    pub l2_penalty: f64,
}

/// Coefficients of a fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLinear {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// `RSS / (n - k)`, NaN when there are no residual degrees of freedom.
    pub residual_variance: f64,
    /// `sigma^2 (X'X)^-1`, intercept first.
    pub covariance: Vec<Vec<f64>>,
}

impl LinearRegression {
    pub fn new(l2_penalty: f64) -> Self {
        LinearRegression { l2_penalty }
    }

    /// Fit `y = b0 + X b + e`.
    ///
    /// * `x` - Design matrix, without an intercept column.
    /// * `y` - Response, one value per row of `x`.
    pub fn fit(&self, x: &Matrix<f64>, y: &[f64]) -> Result<FittedLinear, AteError> {
        let k = x.cols + 1;
        if x.rows < k {
            return Err(AteError::DegenerateSplit(x.rows, k));
        }
        let mut xtx = gram(x, None);
        add_ridge(&mut xtx, self.l2_penalty);
        let xtx_inv = invert(&xtx)?;
        let xty = cross(x, y);
        let beta: Vec<f64> = xtx_inv
            .iter()
            .map(|row| row.iter().zip(xty.iter()).map(|(a, b)| a * b).sum())
            .collect();

        let fitted = linear_predictor(x, beta[0], &beta[1..]);
        let rss: f64 = y.iter().zip(fitted.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        let dof = x.rows - k;
        let residual_variance = if dof > 0 { rss / dof as f64 } else { f64::NAN };
        let covariance = xtx_inv
            .into_iter()
            .map(|row| row.into_iter().map(|v| v * residual_variance).collect())
            .collect();

        Ok(FittedLinear {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
            residual_variance,
            covariance,
        })
    }
}

impl FittedLinear {
    pub fn predict(&self, x: &Matrix<f64>) -> Vec<f64> {
        linear_predictor(x, self.intercept, &self.coefficients)
    }

    /// Standard error of slope `j` (0-based, intercept excluded).
    pub fn std_error(&self, j: usize) -> f64 {
        self.covariance[j + 1][j + 1].sqrt()
    }
}

/// Separate linear models for the treated and control arms.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeModel {
    pub regression: LinearRegression,
}

/// Fitted per-arm outcome regressions `mu_1(x)` and `mu_0(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedOutcome {
    pub treated: FittedLinear,
    pub control: FittedLinear,
}

impl OutcomeModel {
    pub fn new(l2_penalty: f64) -> Self {
        OutcomeModel {
            regression: LinearRegression::new(l2_penalty),
        }
    }

    pub fn fit(&self, x: &DesignMatrix, y: &[f64], w: &[f64]) -> Result<FittedOutcome, AteError> {
        let (treated_idx, control_idx): (Vec<usize>, Vec<usize>) = (0..x.rows).partition(|&i| w[i] == 1.0);
        if treated_idx.is_empty() {
            return Err(AteError::EmptyArm("treated"));
        }
        if control_idx.is_empty() {
            return Err(AteError::EmptyArm("control"));
        }
        let (y_treated, y_control) = split_by_arm(y, w);
        let treated = self.regression.fit(&x.select_rows(&treated_idx).matrix(), &y_treated)?;
        let control = self.regression.fit(&x.select_rows(&control_idx).matrix(), &y_control)?;
        Ok(FittedOutcome { treated, control })
    }
}

impl FittedOutcome {
    /// Predicted outcome under treatment, `mu_1(x)`.
    pub fn predict_treated(&self, x: &Matrix<f64>) -> Vec<f64> {
        self.treated.predict(x)
    }

    /// Predicted outcome under control, `mu_0(x)`.
    pub fn predict_control(&self, x: &Matrix<f64>) -> Vec<f64> {
        self.control.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit() {
        // y = 1 + 2 x1 - 3 x2
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 1.0, 0.0, 1.0, 3.0, 2.0];
        let matrix = Matrix::new(&x, 5, 2);
        let y: Vec<f64> = (0..5).map(|i| 1.0 + 2.0 * x[i] - 3.0 * x[5 + i]).collect();
        let fitted = LinearRegression::new(0.0).fit(&matrix, &y).unwrap();
        assert!((fitted.intercept - 1.0).abs() < 1e-9);
        assert!((fitted.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((fitted.coefficients[1] + 3.0).abs() < 1e-9);
        assert!(fitted.residual_variance < 1e-12);
        let pred = fitted.predict(&matrix);
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_std_error_simple_regression() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![1.0, 3.0, 2.0, 4.0];
        let fitted = LinearRegression::new(0.0).fit(&Matrix::new(&x, 4, 1), &y).unwrap();
        // slope 0.8, RSS 1.8, sigma^2 0.9, Sxx 5.
        assert!((fitted.coefficients[0] - 0.8).abs() < 1e-12);
        assert!((fitted.residual_variance - 0.9).abs() < 1e-12);
        assert!((fitted.std_error(0) - (0.9f64 / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_split() {
        let x = vec![1.0, 2.0];
        let err = LinearRegression::new(0.0)
            .fit(&Matrix::new(&x, 1, 2), &[1.0])
            .unwrap_err();
        assert!(matches!(err, AteError::DegenerateSplit(1, 3)));
    }

    #[test]
    fn test_outcome_model_per_arm() {
        // Treated: y = 5 + x, control: y = x.
        let design = DesignMatrix {
            values: vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0],
            rows: 6,
            cols: 1,
            names: vec!["X1".to_string()],
        };
        let w = vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let y = vec![5.0, 6.0, 7.0, 0.0, 1.0, 2.0];
        let fitted = OutcomeModel::new(0.0).fit(&design, &y, &w).unwrap();
        let mu1 = fitted.predict_treated(&design.matrix());
        let mu0 = fitted.predict_control(&design.matrix());
        for (a, b) in mu1.iter().zip(mu0.iter()) {
            assert!((a - b - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_outcome_model_empty_arm() {
        let design = DesignMatrix {
            values: vec![0.0, 1.0],
            rows: 2,
            cols: 1,
            names: vec!["X1".to_string()],
        };
        let err = OutcomeModel::new(0.0).fit(&design, &[1.0, 2.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, AteError::EmptyArm("treated")));
    }
}
