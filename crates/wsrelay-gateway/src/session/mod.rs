//! Relay session: heartbeat, read deadline, dispatch and reconnect.

pub mod driver;
pub mod engine;
pub mod handle;
pub mod heartbeat;
pub mod issued;
pub mod pending;

use tokio::sync::watch;

pub use driver::{BackoffPolicy, ReconnectDriver};
pub use engine::{EndReason, SessionConfig, SessionEnd, SessionLoop};
pub use handle::{SessionHandle, SessionState};
pub use issued::IssuedIds;
pub use pending::PendingRequests;

/// Resolves once the flag reads `true` or its sender is gone.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
