//! riskcast: minimum-variance portfolio weights and a next-period
//! volatility forecast from historical close prices.
//!
//! Hexagonal architecture: numerics in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command line in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
