use crate::errors::AteError;
use std::collections::VecDeque;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), AteError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), AteError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(AteError::InvalidParameter(parameter.to_string(), ex_msg, value.to_string()))
    } else {
        Ok(())
    }
}

/// Arithmetic mean, NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the `n - 1` denominator.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64
}

pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let (num, den) = values
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(num, den), (v, w)| (num + v * w, den + w));
    num / den
}

/// Weighted variance `sum(w (x - m)^2) / sum(w)`.
pub fn weighted_variance(values: &[f64], weights: &[f64]) -> f64 {
    let m = weighted_mean(values, weights);
    let (num, den) = values
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(num, den), (v, w)| (num + w * (v - m) * (v - m), den + w));
    num / den
}

/// Get the empirical percentiles of a vector of values, where each
/// value carries a sample weight.
///
/// * `v` - A slice of which to find percentiles for. Must not be empty.
/// * `sample_weight` - Sample weights for the instances of the vector.
/// * `percentiles` - Percentiles to look for in the data. This should be
///     values from 0 to 1, and in sorted order.
pub fn percentiles(v: &[f64], sample_weight: &[f64], percentiles: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..v.len()).collect();
    idx.sort_unstable_by(|a, b| v[*a].total_cmp(&v[*b]));

    let mut pcts = VecDeque::from_iter(percentiles.iter().copied());
    let mut p = Vec::with_capacity(percentiles.len());
    let Some(mut current_pct) = pcts.pop_front() else {
        return p;
    };
    let total_values: f64 = sample_weight.iter().sum();
    let mut cuml_pct = 0.0;

    for i in idx.iter() {
        cuml_pct += sample_weight[*i] / total_values;
        // The same value may satisfy several percentiles.
        while cuml_pct >= current_pct {
            p.push(v[*i]);
            match pcts.pop_front() {
                Some(p_) => current_pct = p_,
                None => return p,
            }
        }
    }
    // Accumulated rounding can leave the top percentiles unmatched.
    if let Some(last) = idx.last() {
        while p.len() < percentiles.len() {
            p.push(v[*last]);
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let v = vec![4., 5., 6., 1., 2., 3., 7., 8., 9., 10.];
        let w = vec![1.; v.len()];
        let p = vec![0.3, 0.5, 0.75, 1.0];
        let p = percentiles(&v, &w, &p);
        assert_eq!(p, vec![3.0, 5.0, 8.0, 10.0]);
    }

    #[test]
    fn test_percentiles_weighted() {
        let v = vec![10., 8., 9., 1., 2., 3., 6., 7., 4., 5.];
        let w = vec![1., 1., 1., 1., 1., 2., 1., 1., 5., 1.];
        let p = vec![0.3, 0.5, 0.75, 1.0];
        let p = percentiles(&v, &w, &p);
        assert_eq!(p, vec![4.0, 4.0, 7.0, 10.0]);
    }

    #[test]
    fn test_percentiles_tails() {
        let v: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let w = vec![1.; v.len()];
        let p = percentiles(&v, &w, &[0.025, 0.975]);
        assert_eq!(p, vec![3.0, 98.0]);
    }

    #[test]
    fn test_moments() {
        let v = vec![1., 2., 3., 4.];
        assert_eq!(mean(&v), 2.5);
        assert!((variance(&v) - 5.0 / 3.0).abs() < 1e-12);
        let w = vec![1.; 4];
        assert_eq!(weighted_mean(&v, &w), 2.5);
        assert!((weighted_variance(&v, &w) - 1.25).abs() < 1e-12);
        let w = vec![0., 0., 0., 2.];
        assert_eq!(weighted_mean(&v, &w), 4.0);
        assert_eq!(weighted_variance(&v, &w), 0.0);
    }

    #[test]
    fn test_validate_float_parameter() {
        assert!(validate_float_parameter(0.5, 0.0, 1.0, "fit_fraction").is_ok());
        assert!(validate_float_parameter(1.5, 0.0, 1.0, "fit_fraction").is_err());
        assert!(validate_float_parameter(f64::NAN, 0.0, 1.0, "fit_fraction").is_err());
        assert!(validate_positive_float_parameter(-1.0, "tolerance").is_err());
    }
}
