//! Request/response classification.
//!
//! Both directions share the `request_id` field, so its mere presence does not
//! say which way a frame flows. A frame is a response when it is tagged
//! `kind: "response"`, or when it carries an id this side issued. Everything
//! else is a request and goes to dispatch.

use super::envelope::{Envelope, Kind};

/// Direction of an inbound envelope relative to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Needs dispatch to a handler.
    Request,
    /// Answers something this side sent; never dispatched.
    Response,
}

/// Classify `env`. `issued_here` reports whether an id was generated locally.
pub fn classify(env: &Envelope, issued_here: impl FnOnce(&str) -> bool) -> Direction {
    if env.kind == Some(Kind::Response) {
        return Direction::Response;
    }
    if !env.request_id.is_empty() && issued_here(&env.request_id) {
        return Direction::Response;
    }
    Direction::Request
}
