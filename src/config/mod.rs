//! Configuration module for the loopback.
//!
//! Provides CLI argument parsing and the fixed stream settings.

#[allow(clippy::module_inception)]
mod config;

pub use config::{AppConfig, SampleFormat, StreamSettings};
