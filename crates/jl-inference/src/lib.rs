//! # jl-inference
//!
//! Limit setting for JetLimits.
//!
//! This crate provides:
//! - replica ensembles (bootstrap / exhaustive sampling)
//! - the binned Poisson probability model with replica averaging
//! - percentile curves, the adaptive λ range and the Bayesian posterior
//! - Asimov pseudo-data and coverage trials
//! - limit orchestration per (contact model, interference sign)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::needless_range_loop)]

/// Posterior on a λ grid, percentiles and mass-scale limits.
pub mod bayes;
/// Coverage trials over fluctuated Asimov datasets.
pub mod coverage;
/// Replica ensembles.
pub mod ensemble;
/// Limits per (model, sign).
pub mod limits;
/// Poisson likelihood over an ensemble.
pub mod model;
/// Per-bin percentile curves.
pub mod percentile;
/// Adaptive upper bound of the λ range.
pub mod range;
/// Asimov datasets and fluctuations.
pub mod toys;

pub use bayes::{BayesPosterior, NO_LIMIT, PosteriorConfig, Prior, mass_scale_limit};
pub use coverage::{CoverageConfig, CoverageSummary, CoverageTarget, CoverageTrialRunner, PercentileCoverage};
pub use ensemble::{Ensemble, EnsembleConfig, Replica, ReplicaHandle, SamplingPolicy};
pub use limits::{CombinationOutcome, CombinationResult, ExpectedData, LimitCalculator, LimitConfig, PercentileLimit};
pub use model::{LambdaSlice, NuisanceMode, PoiLikelihood, ProbabilityModel, ProfileLikelihood};
pub use percentile::PercentileCurve;
pub use range::{RangeConfig, RangeOptimizer, RangeScan};
