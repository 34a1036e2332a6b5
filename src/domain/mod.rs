//! Core domain types and numerics.

pub mod price;
pub mod returns;
pub mod stats;
pub mod optimizer;
pub mod volatility;
pub mod forecaster;
pub mod analysis;
pub mod summary;
pub mod universe;
pub mod config_validation;
pub mod error;
