//! # jl-core
//!
//! Shared vocabulary of JetLimits: the error type, contact-interaction model
//! parameters, binned datasets, typed replica identifiers and the spectrum
//! traits implemented by external spectrum providers.

#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{CiSpectrum, Spectrum, SpectrumSource};
pub use types::{
    BinRange, CiCoefficients, ContactModel, DataSet, EnsembleConfig, Interference, Kappa,
    MemberId, ModelParams, PdfSet, ReplicaId, ReplicaRecord, SamplingPolicy, ScalePair,
    lambda_from_mass_scale,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
