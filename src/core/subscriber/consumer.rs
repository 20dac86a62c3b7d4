use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::broker::client::{BrokerClient, DeliveryHandler};
use crate::core::cancel::CancellationSignal;
use crate::core::error::{PubSubError, Result};
use crate::core::message::Message;
use crate::core::subscriber::Delivery;

/// Result of counting one acknowledged delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Counter value right after this delivery's increment.
    pub count: u64,
    /// Whether this delivery fired the cancellation signal.
    pub fired: bool,
}

/// Shared counter of processed deliveries that fires a cancellation signal
/// when it reaches its threshold.
///
/// Increment, compare and fire happen inside one critical section, so under
/// any interleaving exactly one caller sees `fired == true`: the one whose
/// increment made the count equal the threshold.
#[derive(Debug)]
pub struct DeliveryCounter {
    received: Mutex<u64>,
    threshold: NonZeroU64,
    cancel: CancellationSignal,
}

impl DeliveryCounter {
    pub fn new(threshold: NonZeroU64, cancel: CancellationSignal) -> Self {
        Self {
            received: Mutex::new(0),
            threshold,
            cancel,
        }
    }

    pub fn record(&self) -> Tally {
        let mut received = self.received.lock().unwrap_or_else(PoisonError::into_inner);
        *received += 1;
        let fired = *received == self.threshold.get() && self.cancel.fire();
        Tally {
            count: *received,
            fired,
        }
    }

    pub fn received(&self) -> u64 {
        *self.received.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn threshold(&self) -> NonZeroU64 {
        self.threshold
    }
}

/// How a bounded consume ended when the transport did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    /// Deliveries handled and acknowledged, including any that were already
    /// in flight when the threshold was reached.
    pub received: u64,
    /// `false` if the transport ended the pull on its own before the threshold.
    pub threshold_reached: bool,
}

/// Pulls from a subscription until a fixed number of messages has been handled.
pub struct BoundedConsumer<C> {
    client: Arc<C>,
}

impl<C: BrokerClient> BoundedConsumer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Runs a streaming pull on `subscription`. For each delivery: invoke
    /// `handler`, acknowledge, then count. Cancellation is requested once, when
    /// the count reaches `threshold`; the call returns after the transport has
    /// drained in-flight deliveries.
    ///
    /// `handler` may run on several workers at once.
    ///
    /// # Errors
    /// `ReceiveFailed` if the transport fails, whether or not the threshold was reached.
    pub async fn consume_until<H>(
        &self,
        subscription: &str,
        threshold: NonZeroU64,
        handler: H,
    ) -> Result<Completed>
    where
        H: Fn(&Message) + Send + Sync + 'static,
    {
        let cancel = CancellationSignal::new();
        let counter = Arc::new(DeliveryCounter::new(threshold, cancel.clone()));

        let on_delivery: DeliveryHandler = {
            let counter = Arc::clone(&counter);
            let subscription = subscription.to_owned();
            Arc::new(move |delivery: Delivery| {
                let attempt = delivery.attempt();
                let (message, ack) = delivery.into_parts();
                handler(&message);
                ack.ack();

                let tally = counter.record();
                debug!(
                    target: "blipsub::consumer",
                    subscription = %subscription,
                    count = tally.count,
                    attempt,
                    "Delivery acknowledged"
                );
                if tally.fired {
                    info!(
                        target: "blipsub::consumer",
                        subscription = %subscription,
                        threshold = counter.threshold().get(),
                        "Threshold reached; cancelling receive"
                    );
                }
            })
        };

        info!(
            target: "blipsub::consumer",
            subscription,
            threshold = threshold.get(),
            "Starting streaming pull"
        );
        let pulled = self
            .client
            .streaming_pull(subscription, on_delivery, cancel.clone())
            .await;
        let received = counter.received();

        match pulled {
            Ok(()) => {
                let threshold_reached = cancel.is_fired();
                if !threshold_reached {
                    warn!(
                        target: "blipsub::consumer",
                        subscription,
                        received,
                        "Streaming pull ended before the threshold"
                    );
                }
                info!(target: "blipsub::consumer", subscription, received, "Consumption complete");
                Ok(Completed {
                    received,
                    threshold_reached,
                })
            }
            Err(source) => {
                warn!(
                    target: "blipsub::consumer",
                    subscription,
                    received,
                    error = %source,
                    "Streaming pull failed"
                );
                Err(PubSubError::ReceiveFailed {
                    subscription: subscription.to_owned(),
                    received,
                    source,
                })
            }
        }
    }
}
