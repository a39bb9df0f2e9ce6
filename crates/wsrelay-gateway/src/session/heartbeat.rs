//! Heartbeat scheduler.
//!
//! Each tick sends an application-level heartbeat with a fresh correlation id. No
//! reply is awaited unless strict liveness is on, in which case a heartbeat still
//! unacknowledged when the next tick fires ends the session.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Envelope;

/// Ticker whose first tick is one full period away.
pub fn schedule(period: Duration) -> Interval {
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

#[derive(Debug, Default)]
pub struct Heartbeat {
    strict: bool,
    outstanding: Option<String>,
}

impl Heartbeat {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            outstanding: None,
        }
    }

    /// Build the next heartbeat and remember its id.
    pub fn next_heartbeat(&mut self) -> Result<Envelope> {
        if self.strict {
            if let Some(missed) = self.outstanding.take() {
                return Err(RelayError::HeartbeatMissed(missed));
            }
        }
        let id = Uuid::new_v4().to_string();
        self.outstanding = Some(id.clone());
        Ok(Envelope::heartbeat(id))
    }

    /// True if `id` is the heartbeat currently awaiting acknowledgement.
    pub fn is_outstanding(&self, id: &str) -> bool {
        self.outstanding.as_deref() == Some(id)
    }

    /// Clear the slot if `id` answers the outstanding heartbeat.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        if self.is_outstanding(id) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }
}
