//! Port traits the core talks to.

pub mod config_port;
pub mod data_port;
pub mod report_port;
