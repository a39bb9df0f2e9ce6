//! wsRelay core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire envelope, the request/response classification
//! rule, and the error taxonomy shared by the gateway and its tests. It carries
//! no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `RelayError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorClass, ErrorCode, RelayError, Result};
