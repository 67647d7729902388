//! Limit workspace JSON format

pub mod schema;


pub use schema::*;
