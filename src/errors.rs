//! Errors
//!
//! Custom error types used throughout the `mindset_ate` crate.
use thiserror::Error;

/// Errors that can occur while loading data, fitting models or estimating effects.
#[derive(Debug, Error)]
pub enum AteError {
    /// A required column is absent from the input file.
    #[error("Required column `{0}` was not found in the input data.")]
    MissingColumn(String),
    /// Failure raised by the delimited-file reader.
    #[error("Unable to parse delimited input: {0}")]
    Csv(#[from] csv::Error),
    /// Failure raised while reading or writing a file.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// First value is the column, second is the offending value, third the
    /// 1-based line of the input file (the header is line 1). Datasets built
    /// in memory report the 1-based record number.
    #[error("Invalid value `{1}` in column `{0}` at line {2}.")]
    InvalidValue(String, String, usize),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Columns passed to a constructor do not share a length.
    #[error("Column `{0}` has {1} values, expected {2}.")]
    LengthMismatch(String, usize, usize),
    /// The dataset has no records at all.
    #[error("The dataset has no records.")]
    EmptyDataset,
    /// One treatment arm has no records.
    #[error("The {0} arm has no records.")]
    EmptyArm(&'static str),
    /// A subset has too few records to fit the requested model.
    #[error("Degenerate split: {0} records available to fit {1} parameters.")]
    DegenerateSplit(usize, usize),
    /// A linear system could not be solved.
    #[error("Singular matrix: pivot {0} has magnitude {1:e}.")]
    SingularMatrix(usize, f64),
    /// Iterative fitting did not converge.
    #[error("Logistic regression did not converge after {0} iterations.")]
    NotConverged(usize),
    /// Fitted probabilities reproduce the treatment assignment exactly.
    #[error("Perfect separation of treatment by covariates detected at iteration {0}.")]
    PerfectSeparation(usize),
    /// Propensity scores outside the permitted bounds.
    #[error("{0} propensity scores fall outside ({1}, {2}).")]
    ExtremePropensity(usize, f64, f64),
    /// An estimator produced NaN or infinity.
    #[error("Estimator `{0}` produced a non-finite value.")]
    NonFinite(String),
    /// The bootstrap was asked for zero replicates.
    #[error("The bootstrap requires at least one replicate.")]
    NoReplicates,
    /// Every bootstrap replicate failed.
    #[error("None of the {0} bootstrap replicates produced a valid estimate.")]
    NoValidReplicates(usize),
    /// Unable to write output to a file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read input from a file.
    #[error("Unable to read from file: {0}")]
    UnableToRead(String),
}

impl AteError {
    /// Whether a bootstrap replicate failing with this error may be skipped
    /// without terminating the run.
    pub fn is_replicate_failure(&self) -> bool {
        matches!(
            self,
            AteError::EmptyArm(_)
                | AteError::DegenerateSplit(..)
                | AteError::SingularMatrix(..)
                | AteError::NotConverged(_)
                | AteError::PerfectSeparation(_)
                | AteError::ExtremePropensity(..)
                | AteError::NonFinite(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicate_failure_classification() {
        assert!(AteError::NotConverged(50).is_replicate_failure());
        assert!(AteError::ExtremePropensity(3, 0.01, 0.99).is_replicate_failure());
        assert!(AteError::EmptyArm("treated").is_replicate_failure());
        assert!(!AteError::MissingColumn("Y".to_string()).is_replicate_failure());
        assert!(!AteError::NoReplicates.is_replicate_failure());
        assert!(!AteError::EmptyDataset.is_replicate_failure());
    }

    #[test]
    fn test_messages() {
        let e = AteError::MissingColumn("X4".to_string());
        assert_eq!(e.to_string(), "Required column `X4` was not found in the input data.");
        let e = AteError::ExtremePropensity(2, 0.01, 0.99);
        assert_eq!(e.to_string(), "2 propensity scores fall outside (0.01, 0.99).");
        let e = AteError::InvalidValue("X1".to_string(), "abc".to_string(), 4);
        assert_eq!(e.to_string(), "Invalid value `abc` in column `X1` at line 4.");
    }
}
