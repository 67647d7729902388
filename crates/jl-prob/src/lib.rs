//! Probability building blocks for JetLimits.
//!
//! - Poisson log-probability for (possibly non-integer) bin counts
//! - small numeric helpers (stable log-sum-exp / log-mean-exp)

pub mod math;
pub mod poisson;
