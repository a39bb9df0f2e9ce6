//! Lightweight in-process metrics.
//!
//! Stored as atomics behind `DashMap` and rendered in Prometheus text format by
//! the hub's `/metrics` route.

pub mod metrics;

pub use metrics::RelayMetrics;
