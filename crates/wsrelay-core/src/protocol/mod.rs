//! Protocol modules (envelope codec + direction classification).
//!
//! Both are pure and panic-free: malformed input is reported as `RelayError`
//! so one bad frame never takes down a long-lived session.

pub mod classify;
pub mod envelope;

pub use classify::{classify, Direction};
pub use envelope::{decode, encode, Envelope, Kind};
