//! Small numerically-stable math utilities used across probability code.

/// Stable `log(Σ exp(xᵢ))`.
///
/// Returns `-inf` for an empty slice or when every term is `-inf`.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Stable `log((1/n) Σ exp(xᵢ))`.
pub fn log_mean_exp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NEG_INFINITY;
    }
    log_sum_exp(xs) - (xs.len() as f64).ln()
}

/// `log` of the smallest positive subnormal `f64`.
///
/// Log-likelihoods below this value underflow once exponentiated.
pub fn ln_denorm_min() -> f64 {
    f64::from_bits(1).ln()
}
