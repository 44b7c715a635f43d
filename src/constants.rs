pub const BOOTSTRAP_ITERATIONS: usize = 100;
pub const CONFIDENCE_LEVEL: f64 = 0.95;
pub const PROPENSITY_LOWER: f64 = 0.01;
pub const PROPENSITY_UPPER: f64 = 0.99;
pub const MIN_VALID_REPLICATES: usize = 20;
pub const FIT_FRACTION: f64 = 0.5;
pub const MAX_ITERATIONS: usize = 50;
pub const TOLERANCE: f64 = 1e-8;
pub const L2_PENALTY: f64 = 1e-6;
pub const PIVOT_EPS: f64 = 1e-12;
pub const SD_EPS: f64 = 1e-12;
pub const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
pub const SEPARATION_EPS: f64 = 1e-4;
