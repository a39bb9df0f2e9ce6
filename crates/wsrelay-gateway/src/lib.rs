//! wsrelay gateway library entry.
//!
//! Wires the relay session (heartbeat, dispatch, reconnect), the model
//! backend, the local broadcast hub and the ops endpoints. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod hub;
pub mod obs;
pub mod ops;
pub mod router;
pub mod services;
pub mod session;
pub mod transport;
