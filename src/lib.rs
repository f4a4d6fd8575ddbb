//! Regulatory snapshot service: point-in-time reporting extracts with a guarded lifecycle.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
