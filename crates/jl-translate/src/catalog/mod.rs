//! Spectrum catalog JSON format

pub mod schema;
pub mod spectrum;

#[cfg(test)]
mod tests;

pub use schema::*;
pub use spectrum::*;
