//! Sequences listing, publishing and bounded consumption, and prints the
//! human-readable report for each step.

use anyhow::Context;
use std::io::Write;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::broker::client::BrokerClient;
use crate::config::DemoConfig;
use crate::core::catalog::{CatalogLister, SubscriptionDescriptor, TopicDescriptor};
use crate::core::message::{Message, MessageId};
use crate::core::publisher::Publisher;
use crate::core::subscriber::{BoundedConsumer, Completed};

/// What a full `run` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub topics: Vec<TopicDescriptor>,
    pub subscriptions: Vec<SubscriptionDescriptor>,
    pub message_id: MessageId,
    pub consumed: Completed,
}

/// Drives one CLI invocation against a single shared client.
///
/// Every step halts on the first failure; nothing is retried.
pub struct Orchestrator<C, W> {
    catalog: CatalogLister<C>,
    publisher: Publisher<C>,
    consumer: BoundedConsumer<C>,
    out: Arc<Mutex<W>>,
}

impl<C, W> Orchestrator<C, W>
where
    C: BrokerClient,
    W: Write + Send + 'static,
{
    pub fn new(client: Arc<C>, out: W) -> Self {
        Self {
            catalog: CatalogLister::new(Arc::clone(&client)),
            publisher: Publisher::new(Arc::clone(&client)),
            consumer: BoundedConsumer::new(client),
            out: Arc::new(Mutex::new(out)),
        }
    }

    /// Shared handle to the report sink.
    pub fn output(&self) -> Arc<Mutex<W>> {
        Arc::clone(&self.out)
    }

    pub async fn list_topics(&self) -> anyhow::Result<Vec<TopicDescriptor>> {
        let topics = self
            .catalog
            .list_topics()
            .await
            .context("Failed to list topics")?;

        self.report(|out| {
            writeln!(out, "Listing all topics from the project:")?;
            for topic in &topics {
                writeln!(out, "{topic}")?;
            }
            Ok(())
        })?;
        Ok(topics)
    }

    pub async fn list_subscriptions(
        &self,
        topic: &str,
    ) -> anyhow::Result<Vec<SubscriptionDescriptor>> {
        let subscriptions = self
            .catalog
            .list_subscriptions(topic)
            .await
            .context("Failed to list subscriptions")?;

        self.report(|out| {
            writeln!(out, "Listing all subscriptions from the project:")?;
            for subscription in &subscriptions {
                writeln!(out, "{subscription}")?;
            }
            Ok(())
        })?;
        Ok(subscriptions)
    }

    pub async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<MessageId> {
        self.report(|out| writeln!(out, "PUBLISH:"))?;
        let id = self
            .publisher
            .publish(topic, payload.to_owned())
            .await
            .context("Failed to publish")?;

        self.report(|out| writeln!(out, "Published a message; msg ID: {id}"))?;
        Ok(id)
    }

    /// Prints each received payload as `Got message: "<payload>"`.
    ///
    /// Lines from concurrent deliveries are not ordered relative to each other.
    pub async fn consume(
        &self,
        subscription: &str,
        threshold: NonZeroU64,
    ) -> anyhow::Result<Completed> {
        let out = Arc::clone(&self.out);
        let completed = self
            .consumer
            .consume_until(subscription, threshold, move |message: &Message| {
                let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = writeln!(out, "Got message: {:?}", message.text()) {
                    warn!(target: "blipsub::app", error = %e, "Failed to write received message");
                }
            })
            .await
            .context("Failed to receive")?;
        Ok(completed)
    }

    /// The full walkthrough: topics, subscriptions of the demo topic, publish,
    /// then consume from the demo subscription until `threshold`.
    pub async fn run(&self, demo: &DemoConfig, threshold: NonZeroU64) -> anyhow::Result<RunSummary> {
        let topics = self.list_topics().await?;
        let subscriptions = self.list_subscriptions(&demo.topic).await?;
        let message_id = self.publish(&demo.topic, &demo.payload).await?;
        let consumed = self.consume(&demo.subscription, threshold).await?;

        Ok(RunSummary {
            topics,
            subscriptions,
            message_id,
            consumed,
        })
    }

    fn report<F>(&self, write: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut W) -> std::io::Result<()>,
    {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        write(&mut *out).context("Failed to write report")?;
        out.flush().context("Failed to write report")
    }
}
