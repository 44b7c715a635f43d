//! Study Configuration
//!
//! Defines the column specification shared by every model and diagnostic, the
//! replicate policy for extreme propensity scores, and the `StudyConfig`
//! that drives a full analysis.
use crate::causal::Method;
use crate::constants::{
    BOOTSTRAP_ITERATIONS, CONFIDENCE_LEVEL, FIT_FRACTION, L2_PENALTY, MAX_ITERATIONS, MIN_VALID_REPLICATES,
    PROPENSITY_LOWER, PROPENSITY_UPPER, TOLERANCE,
};
use crate::errors::AteError;
use crate::utils::{validate_float_parameter, validate_positive_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How a covariate enters the design matrix.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum CovariateKind {
    /// Used as-is.
    Numeric,
    /// One indicator column per observed level, lowest level dropped.
    Categorical,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Covariate {
    pub name: String,
    pub kind: CovariateKind,
}

impl Covariate {
    pub fn new(name: &str, kind: CovariateKind) -> Self {
        Covariate {
            name: name.to_string(),
            kind,
        }
    }
}

/// Named columns of the input: outcome, treatment indicator and covariates.
///
/// This is the single covariate list used by the propensity model, the
/// outcome models, the regression adjustment and the balance diagnostic.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ColumnSpec {
    pub outcome: String,
    pub treatment: String,
    pub covariates: Vec<Covariate>,
}

impl ColumnSpec {
    /// Columns of the National Study of Learning Mindsets extract.
    ///
    /// * `S3` - student self-reported expectations of success.
    /// * `C1` - race/ethnicity (categorical).
    /// * `C2` - gender.
    /// * `C3` - first-generation status.
    /// * `XC` - school urbanicity (categorical).
    /// * `X1` - school-level mean of fixed mindsets.
    /// * `X2` - school achievement level.
    /// * `X3` - school racial/ethnic minority composition.
    /// * `X4` - school poverty concentration.
    /// * `X5` - school size.
    pub fn mindset() -> Self {
        use CovariateKind::*;
        ColumnSpec {
            outcome: "Y".to_string(),
            treatment: "Z".to_string(),
            covariates: vec![
                Covariate::new("S3", Numeric),
                Covariate::new("C1", Categorical),
                Covariate::new("C2", Numeric),
                Covariate::new("C3", Numeric),
                Covariate::new("XC", Categorical),
                Covariate::new("X1", Numeric),
                Covariate::new("X2", Numeric),
                Covariate::new("X3", Numeric),
                Covariate::new("X4", Numeric),
                Covariate::new("X5", Numeric),
            ],
        }
    }

    pub fn covariate_names(&self) -> Vec<String> {
        self.covariates.iter().map(|c| c.name.clone()).collect()
    }
}

impl Default for ColumnSpec {
    fn default() -> Self {
        ColumnSpec::mindset()
    }
}

/// What to do with a bootstrap replicate whose propensity scores leave the bounds.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ReplicatePolicy {
    /// Drop the whole replicate.
    #[default]
    DiscardReplicate,
    /// Keep the replicate and exclude only the offending records.
    TrimRecords,
}

/// Settings for the iterative and least-squares solvers.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct SolverConfig {
    /// Newton iterations allowed for the logistic fit.
    pub max_iterations: usize,
    /// Convergence threshold on the largest coefficient update.
    pub tolerance: f64,
    /// Ridge penalty applied to non-intercept coefficients.
    pub l2_penalty: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iterations: MAX_ITERATIONS,
            tolerance: TOLERANCE,
            l2_penalty: L2_PENALTY,
        }
    }
}

fn default_bootstrap_iterations() -> usize {
    BOOTSTRAP_ITERATIONS
}
fn default_confidence_level() -> f64 {
    CONFIDENCE_LEVEL
}
fn default_propensity_bounds() -> (f64, f64) {
    (PROPENSITY_LOWER, PROPENSITY_UPPER)
}
fn default_fit_fraction() -> f64 {
    FIT_FRACTION
}
fn default_min_valid_replicates() -> usize {
    MIN_VALID_REPLICATES
}
fn default_methods() -> Vec<Method> {
    Method::ALL.to_vec()
}
fn default_delimiter() -> char {
    ','
}

/// Configuration for a full analysis run.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct StudyConfig {
    /// Input columns and covariate set.
    #[serde(default)]
    pub columns: ColumnSpec,
    /// Field delimiter of the input file.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Number of bootstrap replicates per method.
    #[serde(default = "default_bootstrap_iterations")]
    pub bootstrap_iterations: usize,
    /// Seed for resampling and the AIPW split.
    #[serde(default)]
    pub seed: u64,
    /// Coverage of the reported intervals.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Open interval a propensity score must fall in.
    #[serde(default = "default_propensity_bounds")]
    pub propensity_bounds: (f64, f64),
    /// Extreme-score handling inside bootstrap replicates.
    #[serde(default)]
    pub replicate_policy: ReplicatePolicy,
    /// Share of each (re)sample used to fit the AIPW outcome models.
    #[serde(default = "default_fit_fraction")]
    pub fit_fraction: f64,
    /// Below this many surviving replicates a warning is raised.
    #[serde(default = "default_min_valid_replicates")]
    pub min_valid_replicates: usize,
    /// Number of threads for the bootstrap.
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Estimators to run, in report order.
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    /// Use analytic normal intervals for the unadjusted and regression estimates.
    #[serde(default)]
    pub analytic_intervals: bool,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            columns: ColumnSpec::mindset(),
            delimiter: ',',
            bootstrap_iterations: BOOTSTRAP_ITERATIONS,
            seed: 0,
            confidence_level: CONFIDENCE_LEVEL,
            propensity_bounds: (PROPENSITY_LOWER, PROPENSITY_UPPER),
            replicate_policy: ReplicatePolicy::DiscardReplicate,
            fit_fraction: FIT_FRACTION,
            min_valid_replicates: MIN_VALID_REPLICATES,
            num_threads: None,
            methods: Method::ALL.to_vec(),
            analytic_intervals: false,
            solver: SolverConfig::default(),
        }
    }
}

impl StudyConfig {
    /// Check parameter ranges before any data is touched.
    pub fn validate(&self) -> Result<(), AteError> {
        validate_float_parameter(self.confidence_level, 0.0, 1.0, "confidence_level")?;
        validate_float_parameter(self.fit_fraction, 0.0, 1.0, "fit_fraction")?;
        validate_positive_float_parameter(self.solver.tolerance, "tolerance")?;
        validate_positive_float_parameter(self.solver.l2_penalty, "l2_penalty")?;
        let (lower, upper) = self.propensity_bounds;
        validate_float_parameter(lower, 0.0, 0.5, "propensity_bounds.0")?;
        validate_float_parameter(upper, 0.5, 1.0, "propensity_bounds.1")?;
        if self.fit_fraction == 0.0 || self.fit_fraction == 1.0 {
            return Err(AteError::InvalidParameter(
                "fit_fraction".to_string(),
                "a value strictly between 0 and 1".to_string(),
                self.fit_fraction.to_string(),
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(AteError::InvalidParameter(
                "delimiter".to_string(),
                "a single ASCII character".to_string(),
                self.delimiter.to_string(),
            ));
        }
        if self.columns.covariates.is_empty() {
            return Err(AteError::InvalidParameter(
                "columns.covariates".to_string(),
                "at least one covariate".to_string(),
                "none".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

/// IO
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save a configuration as a json object to a file.
    ///
    /// * `path` - Path to save the configuration.
    fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), AteError> {
        fs::write(path, self.json_dump()?).map_err(|e| AteError::UnableToWrite(e.to_string()))
    }

    /// Dump a configuration as a json object
    fn json_dump(&self) -> Result<String, AteError> {
        serde_json::to_string_pretty(self).map_err(|e| AteError::UnableToWrite(e.to_string()))
    }

    /// Load a configuration from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, AteError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| AteError::UnableToRead(e.to_string()))
    }

    /// Load a configuration from a path to a json object.
    ///
    /// * `path` - Path to load the configuration from.
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, AteError> {
        let json_str = fs::read_to_string(path).map_err(|e| AteError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for StudyConfig {}
