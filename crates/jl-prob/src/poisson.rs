//! Poisson distribution utilities.
//!
//! Counts are `f64`: Asimov datasets carry non-integer expected counts, and the
//! log-probability `k ln μ − μ − lnΓ(k+1)` is well defined for any real `k ≥ 0`.

use jl_core::{Error, Result};
use statrs::function::gamma::ln_gamma;

/// Log-PMF of Poisson(`k` | `mu`).
///
/// - `k` must be finite and `>= 0`.
/// - `mu <= 0` is the degenerate limit: `0` for `k == 0`, `-inf` otherwise.
pub fn logpmf(k: f64, mu: f64) -> Result<f64> {
    if !(k.is_finite() && k >= 0.0) {
        return Err(Error::Validation(format!("count must be finite and >= 0, got {}", k)));
    }
    if mu.is_nan() {
        return Err(Error::Validation("Poisson mean is NaN".to_string()));
    }
    if mu <= 0.0 {
        return Ok(if k == 0.0 { 0.0 } else { f64::NEG_INFINITY });
    }
    if mu.is_infinite() {
        return Ok(f64::NEG_INFINITY);
    }
    let k_ln_mu = if k == 0.0 { 0.0 } else { k * mu.ln() };
    Ok(k_ln_mu - mu - ln_gamma(k + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_k0() {
        let lp = logpmf(0.0, 2.0).unwrap();
        assert_relative_eq!(lp, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matches_factorial_form() {
        // P(3 | 2.5) = 2.5^3 e^{-2.5} / 6
        let expected = (2.5f64.powi(3) * (-2.5f64).exp() / 6.0).ln();
        assert_relative_eq!(logpmf(3.0, 2.5).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_non_integer_count_is_continuous() {
        let a = logpmf(10.0, 10.0).unwrap();
        let b = logpmf(10.0 + 1e-7, 10.0).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_mean() {
        assert_eq!(logpmf(0.0, 0.0).unwrap(), 0.0);
        assert_eq!(logpmf(0.0, -1.0).unwrap(), 0.0);
        assert_eq!(logpmf(2.0, -1.0).unwrap(), f64::NEG_INFINITY);
        assert!(logpmf(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_invalid_count() {
        assert!(logpmf(-1.0, 2.0).is_err());
        assert!(logpmf(f64::INFINITY, 2.0).is_err());
    }
}
