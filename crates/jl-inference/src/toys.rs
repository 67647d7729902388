//! Pseudo-data generation (Asimov + fluctuation).

use jl_core::{Error, ModelParams, Result};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};

use crate::model::{NuisanceMode, ProbabilityModel};

/// Means above this are fluctuated with a rounded Gaussian instead of a Poisson.
pub const DEFAULT_GAUSSIAN_THRESHOLD: f64 = 1.0e4;

/// Asimov dataset: expected counts at `params`, luminosity taken from the model.
pub fn asimov_counts(model: &ProbabilityModel, params: &ModelParams, mode: NuisanceMode) -> Result<Vec<f64>> {
    model.expected_counts(params, mode)
}

/// One pseudo-experiment drawn around `expected`.
///
/// Non-positive or non-finite means give 0 counts.
pub fn fluctuate<R: Rng + ?Sized>(expected: &[f64], gaussian_threshold: f64, rng: &mut R) -> Result<Vec<f64>> {
    expected
        .iter()
        .map(|&mean| {
            if !mean.is_finite() || mean <= 0.0 {
                return Ok(0.0);
            }
            if mean > gaussian_threshold {
                let normal = Normal::new(mean, mean.sqrt())
                    .map_err(|e| Error::Computation(format!("Normal({mean}): {e}")))?;
                Ok(normal.sample(&mut *rng).round().max(0.0))
            } else {
                let pois = Poisson::new(mean)
                    .map_err(|e| Error::Computation(format!("Poisson({mean}): {e}")))?;
                Ok(pois.sample(&mut *rng))
            }
        })
        .collect()
}

/// [`fluctuate`] with a fresh `StdRng` seeded by `seed`.
pub fn fluctuate_seeded(expected: &[f64], gaussian_threshold: f64, seed: u64) -> Result<Vec<f64>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    fluctuate(expected, gaussian_threshold, &mut rng)
}

/// `n_toys` pseudo-experiments; toy `i` uses seed `seed + i`.
pub fn poisson_toys(expected: &[f64], n_toys: usize, seed: u64, gaussian_threshold: f64) -> Result<Vec<Vec<f64>>> {
    (0..n_toys)
        .map(|i| fluctuate_seeded(expected, gaussian_threshold, seed.wrapping_add(i as u64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_toys_reproducible() {
        let expected = [120.0, 35.5, 0.7];
        let a = poisson_toys(&expected, 5, 123, DEFAULT_GAUSSIAN_THRESHOLD).unwrap();
        let b = poisson_toys(&expected, 5, 123, DEFAULT_GAUSSIAN_THRESHOLD).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn test_counts_are_integral_and_non_negative() {
        let expected = [0.0, -3.0, f64::NAN, 4.2, 5.0e6];
        let toy = fluctuate_seeded(&expected, DEFAULT_GAUSSIAN_THRESHOLD, 9).unwrap();
        assert_eq!(&toy[..3], &[0.0, 0.0, 0.0]);
        for v in &toy {
            assert!(*v >= 0.0 && v.fract() == 0.0);
        }
        // Gaussian branch stays within ~6σ of the mean
        assert!((toy[4] - 5.0e6).abs() < 6.0 * 5.0e6f64.sqrt());
    }

    #[test]
    fn test_poisson_mean() {
        let toys = poisson_toys(&[25.0], 4000, 1, DEFAULT_GAUSSIAN_THRESHOLD).unwrap();
        let mean = toys.iter().map(|t| t[0]).sum::<f64>() / toys.len() as f64;
        assert_relative_eq!(mean, 25.0, epsilon = 0.5);
    }
}
