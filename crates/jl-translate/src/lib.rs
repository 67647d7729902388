//! # jl-translate
//!
//! Persisted inputs for JetLimits.
//!
//! - limit workspace JSON (observed spectrum, parameters, ensemble settings)
//! - spectrum catalog JSON (tabulated QCD and CI spectra per replica)

#![warn(clippy::all)]
#![allow(clippy::needless_range_loop)]

pub mod catalog;
pub mod workspace;

pub use catalog::*;
pub use workspace::*;
