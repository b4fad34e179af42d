//! Shared plumbing for otpguard services: config loading, tracing, health
//! probes, request ids and serde helpers.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
