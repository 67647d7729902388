//! Core traits for JetLimits
//!
//! Spectrum generation lives outside this workspace. Inference code only sees
//! spectra through these traits, so tabulated files, in-memory tables and test
//! closures are interchangeable.

use std::sync::Arc;

use crate::types::{CiCoefficients, Kappa, MemberId, PdfSet, ReplicaId, ScalePair};
use crate::Result;

/// Predicted QCD rate of one replica.
pub trait Spectrum: Send + Sync {
    /// Rate integrated over the momentum bin `[lower, upper)`.
    fn rate(&self, lower: f64, upper: f64) -> f64;
}

impl<F> Spectrum for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn rate(&self, lower: f64, upper: f64) -> f64 {
        self(lower, upper)
    }
}

/// Contact-interaction correction of one replica.
pub trait CiSpectrum: Send + Sync {
    /// Expansion coefficients integrated over `[lower, upper)`.
    fn coefficients(&self, lower: f64, upper: f64) -> CiCoefficients;

    /// CI rate at `(lambda, kappa)` over `[lower, upper)`.
    fn rate(&self, lower: f64, upper: f64, lambda: f64, kappa: &Kappa) -> f64 {
        self.coefficients(lower, upper).contribution(lambda, kappa)
    }
}

/// Provider of replica spectra (QCD and QCD+CI pairs).
pub trait SpectrumSource {
    /// Replica directories available under `pdf_set`.
    fn members(&self, pdf_set: PdfSet) -> Result<Vec<MemberId>>;

    /// Scale choices available for every replica.
    fn scale_pairs(&self) -> Result<Vec<ScalePair>>;

    /// The nominal replica (central member, unit scales, no smearing).
    fn nominal(&self) -> Result<ReplicaId>;

    /// QCD spectrum of a replica.
    fn qcd(&self, id: &ReplicaId) -> Result<Arc<dyn Spectrum>>;

    /// CI spectrum of the same replica.
    fn ci(&self, id: &ReplicaId) -> Result<Arc<dyn CiSpectrum>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatCi;

    impl CiSpectrum for FlatCi {
        fn coefficients(&self, lower: f64, upper: f64) -> CiCoefficients {
            let mut c = CiCoefficients::default();
            c.linear[0] = -(upper - lower);
            c
        }
    }

    #[test]
    fn test_closure_is_a_spectrum() {
        let s: Arc<dyn Spectrum> = Arc::new(|lo: f64, hi: f64| 2.0 * (hi - lo));
        assert_eq!(s.rate(1.0, 4.0), 6.0);
    }

    #[test]
    fn test_ci_rate_default_method() {
        let kappa = Kappa([-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(FlatCi.rate(0.0, 2.0, 0.5, &kappa), 1.0);
        assert_eq!(FlatCi.rate(0.0, 2.0, 0.5, &Kappa::ZERO), 0.0);
    }
}
