//! Scenario files and the runner that plays them on the reference host.

pub mod config;
pub mod scenario;
