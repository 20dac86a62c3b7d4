use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broker::client::BrokerClient;
use crate::core::error::{PubSubError, Result, TransportError};
use crate::core::message::{Message, MessageId};

/// Publishes single messages and waits for the broker to confirm each one.
///
/// - One attempt per call. Retrying is up to the caller.
/// - A confirmation carrying an empty id counts as a failure.
pub struct Publisher<C> {
    client: Arc<C>,
}

impl<C: BrokerClient> Publisher<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Publishes `payload` to `topic`, suspending until the broker confirms it.
    ///
    /// # Errors
    /// `PublishFailed` wrapping the transport error if confirmation fails.
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> Result<MessageId> {
        let message = Message::new(payload);
        debug!(
            target: "blipsub::publisher",
            topic,
            bytes = message.payload().len(),
            "Publishing message"
        );

        let confirmation = self.client.publish(topic, message).await;
        match confirmation {
            Ok(id) if !id.is_empty() => {
                info!(target: "blipsub::publisher", topic, message_id = %id, "Publish confirmed");
                Ok(id)
            }
            Ok(_) => Err(self.failed(
                topic,
                TransportError::Rejected("confirmation carried an empty message id".into()),
            )),
            Err(source) => Err(self.failed(topic, source)),
        }
    }

    fn failed(&self, topic: &str, source: TransportError) -> PubSubError {
        warn!(target: "blipsub::publisher", topic, error = %source, "Publish not confirmed");
        PubSubError::PublishFailed {
            topic: topic.to_owned(),
            source,
        }
    }
}
