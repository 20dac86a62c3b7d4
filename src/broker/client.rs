//! The seam between this crate and whatever actually talks to the broker.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::core::cancel::CancellationSignal;
use crate::core::catalog::{SubscriptionDescriptor, TopicDescriptor};
use crate::core::error::TransportError;
use crate::core::message::{Message, MessageId};
use crate::core::subscriber::Delivery;

/// One page of a remote enumeration.
///
/// `next_page_token == None` (or empty) is the "no more pages" signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Resolves once the broker has confirmed (or refused) a publish.
pub type PublishFuture = BoxFuture<'static, Result<MessageId, TransportError>>;

/// Invoked by the transport once per delivery, possibly from many workers at once.
pub type DeliveryHandler = Arc<dyn Fn(Delivery) + Send + Sync>;

/// Broker collaborator. Constructed once per invocation and shared via `Arc`.
///
/// Topic and subscription arguments are short ids (`my-topic`), not full
/// resource names. Returned futures must not borrow those arguments.
pub trait BrokerClient: Send + Sync + 'static {
    fn project(&self) -> &str;

    fn list_topics_page(
        &self,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<TopicDescriptor>, TransportError>>;

    fn list_subscriptions_page(
        &self,
        topic: &str,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<SubscriptionDescriptor>, TransportError>>;

    /// Submits `message`; the returned future carries the confirmation.
    fn publish(&self, topic: &str, message: Message) -> PublishFuture;

    /// Runs a receive loop until `cancel` fires and in-flight deliveries have
    /// drained (`Ok`), or until the transport fails (`Err`).
    ///
    /// After observing `cancel` the transport must stop starting new deliveries.
    fn streaming_pull(
        &self,
        subscription: &str,
        handler: DeliveryHandler,
        cancel: CancellationSignal,
    ) -> BoxFuture<'_, Result<(), TransportError>>;
}
