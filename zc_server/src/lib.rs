//! HTTP server for the zonecup tournament engine.
//!
//! Exposes the engine's commands and queries as a JSON API (see [`api`]),
//! with environment-driven configuration, structured logging and
//! Prometheus metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
