//! Report
//!
//! Results of an analysis run: one [`EstimateResult`] per method, the balance
//! and overlap diagnostics, and renderings as a text table, markdown or json.
use crate::balance::{BalanceDiagnostic, OverlapSummary};
use crate::bootstrap::SkipCounts;
use crate::causal::Method;
use crate::errors::AteError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an interval was obtained.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntervalKind {
    /// Percentiles of the bootstrap distribution.
    Bootstrap,
    /// Normal approximation with a closed-form standard error.
    Analytic,
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalKind::Bootstrap => f.write_str("bootstrap"),
            IntervalKind::Analytic => f.write_str("analytic"),
        }
    }
}

/// Estimate and interval of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub method: Method,
    pub estimate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub interval: IntervalKind,
    pub std_error: f64,
    /// Replicates that entered the interval, `None` for analytic intervals.
    pub replicates: Option<usize>,
    #[serde(default)]
    pub skipped: SkipCounts,
    /// Set when fewer replicates than the configured minimum survived.
    #[serde(default)]
    pub low_replicates: bool,
    /// Replicate estimates, kept for plotting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub draws: Vec<f64>,
}

impl EstimateResult {
    pub fn contains(&self, value: f64) -> bool {
        self.ci_lower <= value && value <= self.ci_upper
    }
}

/// Full output of [`crate::Study::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub n_records: usize,
    pub n_treated: usize,
    pub n_control: usize,
    pub confidence_level: f64,
    pub estimates: Vec<EstimateResult>,
    /// Balance and overlap of the full-data propensity weights. Absent when that
    /// fit failed and no weighting method was requested.
    #[serde(default)]
    pub balance: Option<BalanceDiagnostic>,
    #[serde(default)]
    pub overlap: Option<OverlapSummary>,
    /// Propensity score of every record, from the fit on the full data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propensity: Vec<f64>,
    /// Inverse probability weight of every record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f64>,
}

impl AnalysisReport {
    pub fn estimate(&self, method: Method) -> Option<&EstimateResult> {
        self.estimates.iter().find(|e| e.method == method)
    }

    /// Dump the report as a json object.
    pub fn to_json(&self) -> Result<String, AteError> {
        serde_json::to_string_pretty(self).map_err(|e| AteError::UnableToWrite(e.to_string()))
    }

    /// Load a report from a json string.
    pub fn from_json(json_str: &str) -> Result<Self, AteError> {
        serde_json::from_str::<AnalysisReport>(json_str).map_err(|e| AteError::UnableToRead(e.to_string()))
    }

    pub fn to_markdown(&self) -> String {
        let pct = self.confidence_level * 100.0;
        let mut out = String::new();
        out.push_str("## Average treatment effect\n\n");
        out.push_str(&format!(
            "{} records, {} treated, {} control.\n\n",
            self.n_records, self.n_treated, self.n_control
        ));
        out.push_str(&format!(
            "| Method | Estimate | {pct}% CI | Interval | Replicates |\n|---|---:|---|---|---:|\n"
        ));
        for e in &self.estimates {
            out.push_str(&format!(
                "| {} | {:.4} | [{:.4}, {:.4}] | {} | {} |\n",
                e.method,
                e.estimate,
                e.ci_lower,
                e.ci_upper,
                e.interval,
                e.replicates.map_or("-".to_string(), |r| r.to_string())
            ));
        }
        if let Some(balance) = &self.balance {
            out.push_str("\n## Covariate balance\n\n| Covariate | SMD unweighted | SMD weighted |\n|---|---:|---:|\n");
            for c in &balance.covariates {
                out.push_str(&format!("| {} | {:.4} | {:.4} |\n", c.name, c.smd_unweighted, c.smd_weighted));
            }
        }
        if let Some(overlap) = &self.overlap {
            out.push_str(&format!(
                "\n## Overlap\n\nPropensity range treated [{:.4}, {:.4}], control [{:.4}, {:.4}]. \
                 {} records outside the bounds. Effective sample size {:.1} treated, {:.1} control.\n",
                overlap.min_treated,
                overlap.max_treated,
                overlap.min_control,
                overlap.max_control,
                overlap.n_outside(),
                overlap.ess_treated,
                overlap.ess_control
            ));
        }
        out
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ci = format!("{}% CI", self.confidence_level * 100.0);
        writeln!(
            f,
            "Average treatment effect ({} records: {} treated, {} control)\n",
            self.n_records, self.n_treated, self.n_control
        )?;
        writeln!(f, "{:<24}{:>12}{:>26}{:>12}{:>12}", "Method", "Estimate", ci, "Interval", "Replicates")?;
        for e in &self.estimates {
            let interval = format!("[{:.4}, {:.4}]", e.ci_lower, e.ci_upper);
            let replicates = match e.replicates {
                Some(r) if e.low_replicates => format!("{}*", r),
                Some(r) => r.to_string(),
                None => "-".to_string(),
            };
            writeln!(
                f,
                "{:<24}{:>12.4}{:>26}{:>12}{:>12}",
                e.method.label(),
                e.estimate,
                interval,
                e.interval.to_string(),
                replicates
            )?;
        }
        if self.estimates.iter().any(|e| e.low_replicates) {
            writeln!(f, "* fewer valid bootstrap replicates than requested minimum")?;
        }
        if let Some(balance) = &self.balance {
            writeln!(f, "\nCovariate balance (standardized mean difference)\n")?;
            writeln!(f, "{:<16}{:>14}{:>14}", "Covariate", "Unweighted", "Weighted")?;
            for c in &balance.covariates {
                writeln!(f, "{:<16}{:>14.4}{:>14.4}", c.name, c.smd_unweighted, c.smd_weighted)?;
            }
        }
        match &self.overlap {
            Some(overlap) => {
                writeln!(
                    f,
                    "\nPropensity scores: treated [{:.4}, {:.4}], control [{:.4}, {:.4}], {} outside bounds",
                    overlap.min_treated,
                    overlap.max_treated,
                    overlap.min_control,
                    overlap.max_control,
                    overlap.n_outside()
                )?;
                write!(
                    f,
                    "Effective sample size: treated {:.1}, control {:.1}",
                    overlap.ess_treated, overlap.ess_control
                )
            }
            None => write!(f, "\nPropensity diagnostics unavailable: the propensity model could not be fit."),
        }
    }
}
