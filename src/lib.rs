// Modules
pub mod balance;
pub mod bootstrap;
pub mod causal;
pub mod config;
pub mod constants;
pub mod data;
pub mod encoding;
pub mod errors;
pub mod linalg;
pub mod propensity;
pub mod regression;
pub mod report;
pub mod simulate;
pub mod study;
pub mod utils;

// Individual classes, and functions
pub use balance::{BalanceDiagnostic, OverlapSummary};
pub use bootstrap::{Bootstrap, BootstrapDistribution};
pub use causal::Method;
pub use config::{ColumnSpec, ConfigIO, StudyConfig};
pub use data::{Dataset, Matrix};
pub use errors::AteError;
pub use report::{AnalysisReport, EstimateResult};
pub use study::Study;
