//! Shared plumbing for Paygate services: tracing setup, HTTP layers,
//! pagination parameters and serde helpers.

pub mod pagination;
pub mod serde;
pub mod telemetry;
