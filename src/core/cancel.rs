//! One-shot cancellation trigger shared between a consumer and its transport.

use std::sync::Arc;
use tokio::sync::watch;

/// Armed until [`fire`](CancellationSignal::fire) is called once; fired forever after.
///
/// Clones observe the same trigger.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Fires the signal. Returns `true` only for the call that moved it from armed to fired.
    pub fn fire(&self) -> bool {
        self.state.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the signal has fired (immediately if it already has).
    pub async fn fired(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}
