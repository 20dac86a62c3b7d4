//! In-process broker used as the CLI's default collaborator and in tests.
//!
//! Topics fan each publish out to every attached subscription. Each
//! subscription is an unbounded `flume` queue; a streaming pull runs a pool
//! of workers that take from that queue and run the delivery handler on the
//! blocking pool, so handlers execute in parallel. Deliveries dropped without
//! an ack go back on the queue with their attempt count bumped.

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::client::{BrokerClient, DeliveryHandler, Page, PublishFuture};
use crate::config::EmulatorConfig;
use crate::core::cancel::CancellationSignal;
use crate::core::catalog::{SubscriptionDescriptor, TopicDescriptor};
use crate::core::error::TransportError;
use crate::core::message::{Message, MessageId};
use crate::core::subscriber::{AckHandle, AckOutcome, Delivery};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
struct Pending {
    message: Message,
    attempt: u32,
}

#[derive(Debug, Clone)]
struct SubscriptionQueue {
    tx: flume::Sender<Pending>,
    rx: flume::Receiver<Pending>,
}

impl SubscriptionQueue {
    fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    fn enqueue(&self, message: Message) {
        // Both halves live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(Pending {
            message,
            attempt: 1,
        });
    }

    fn delivery(&self, pending: Pending) -> Delivery {
        let redeliver = self.tx.clone();
        let retry = pending.clone();
        let ack = AckHandle::new(move |outcome| {
            if outcome == AckOutcome::Nack {
                let _ = redeliver.send(Pending {
                    message: retry.message,
                    attempt: retry.attempt + 1,
                });
            }
        });
        Delivery::new(pending.message, pending.attempt, ack)
    }
}

#[derive(Debug)]
pub struct InMemoryBroker {
    project: String,
    page_size: usize,
    workers: usize,
    /// Topic id → ids of attached subscriptions.
    topics: DashMap<String, Vec<String>>,
    subscriptions: DashMap<String, SubscriptionQueue>,
}

impl InMemoryBroker {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            page_size: DEFAULT_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            topics: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of concurrent delivery workers per streaming pull.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Builds a broker with the configured topics and subscriptions, each
    /// subscription pre-loaded with `backlog` messages.
    pub fn from_config(
        project: impl Into<String>,
        cfg: &EmulatorConfig,
    ) -> Result<Self, TransportError> {
        let broker = Self::new(project)
            .with_page_size(cfg.page_size)
            .with_workers(cfg.workers);

        for topic in &cfg.topics {
            broker.create_topic(&topic.name);
            for subscription in &topic.subscriptions {
                broker.create_subscription(&topic.name, subscription)?;
                broker.seed(
                    subscription,
                    (1..=cfg.backlog).map(|i| format!("backlog message {i}")),
                )?;
            }
        }

        info!(
            target: "blipsub::emulator",
            project = %broker.project,
            topics = broker.topics.len(),
            subscriptions = broker.subscriptions.len(),
            backlog = cfg.backlog,
            "In-memory broker ready"
        );
        Ok(broker)
    }

    /// Returns `false` if the topic already existed.
    pub fn create_topic(&self, topic: &str) -> bool {
        match self.topics.entry(topic.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                debug!(target: "blipsub::emulator", topic, "Topic created");
                true
            }
        }
    }

    pub fn create_subscription(&self, topic: &str, subscription: &str) -> Result<(), TransportError> {
        let mut attached = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::NotFound(format!("topic {topic}")))?;

        match self.subscriptions.entry(subscription.to_owned()) {
            Entry::Occupied(_) => Err(TransportError::Rejected(format!(
                "subscription {subscription} already exists"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(SubscriptionQueue::new());
                attached.push(subscription.to_owned());
                debug!(target: "blipsub::emulator", topic, subscription, "Subscription created");
                Ok(())
            }
        }
    }

    /// Places already-published messages directly on a subscription's queue.
    pub fn seed<I, P>(&self, subscription: &str, payloads: I) -> Result<usize, TransportError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        let queue = self.queue(subscription)?;
        let mut seeded = 0;
        for payload in payloads {
            let id = MessageId::from(Uuid::new_v4().to_string());
            queue.enqueue(Message::new(payload).confirmed(id));
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Messages waiting on a subscription, not counting those being delivered.
    pub fn backlog(&self, subscription: &str) -> Option<usize> {
        self.subscriptions.get(subscription).map(|q| q.rx.len())
    }

    fn queue(&self, subscription: &str) -> Result<SubscriptionQueue, TransportError> {
        self.subscriptions
            .get(subscription)
            .map(|q| q.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("subscription {subscription}")))
    }

    fn fan_out(&self, topic: &str, message: Message) -> Result<MessageId, TransportError> {
        let attached = self
            .topics
            .get(topic)
            .map(|subs| subs.value().clone())
            .ok_or_else(|| TransportError::NotFound(format!("topic {topic}")))?;

        let id = MessageId::from(Uuid::new_v4().to_string());
        let confirmed = message.confirmed(id.clone());
        for subscription in &attached {
            if let Some(queue) = self.subscriptions.get(subscription) {
                queue.enqueue(confirmed.clone());
            }
        }

        debug!(
            target: "blipsub::emulator",
            topic,
            message_id = %id,
            fanout = attached.len(),
            "Message accepted"
        );
        Ok(id)
    }

    fn page<T>(
        &self,
        mut ids: Vec<String>,
        page_token: Option<String>,
        make: impl Fn(String) -> T,
    ) -> Result<Page<T>, TransportError> {
        ids.sort();

        let start = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TransportError::Rejected(format!("invalid page token {token:?}")))?,
        };
        let end = start.saturating_add(self.page_size).min(ids.len());
        let next_page_token = (end < ids.len()).then(|| end.to_string());

        let items = ids
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .map(make)
            .collect();
        Ok(Page {
            items,
            next_page_token,
        })
    }
}

impl BrokerClient for InMemoryBroker {
    fn project(&self) -> &str {
        &self.project
    }

    fn list_topics_page(
        &self,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<TopicDescriptor>, TransportError>> {
        let ids = self.topics.iter().map(|t| t.key().clone()).collect();
        let page = self.page(ids, page_token, |id| TopicDescriptor::new(&self.project, id));
        future::ready(page).boxed()
    }

    fn list_subscriptions_page(
        &self,
        topic: &str,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<SubscriptionDescriptor>, TransportError>> {
        let page = match self.topics.get(topic).map(|subs| subs.value().clone()) {
            Some(ids) => self.page(ids, page_token, |id| {
                SubscriptionDescriptor::new(&self.project, id, topic)
            }),
            None => Err(TransportError::NotFound(format!("topic {topic}"))),
        };
        future::ready(page).boxed()
    }

    fn publish(&self, topic: &str, message: Message) -> PublishFuture {
        future::ready(self.fan_out(topic, message)).boxed()
    }

    fn streaming_pull(
        &self,
        subscription: &str,
        handler: DeliveryHandler,
        cancel: CancellationSignal,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        let queue = self.queue(subscription);
        let subscription = subscription.to_owned();
        let workers = self.workers;

        async move {
            let queue = queue?;
            debug!(target: "blipsub::emulator", subscription = %subscription, workers, "Streaming pull opened");

            // Stops the remaining workers after a failure without touching the
            // caller's signal.
            let halt = CancellationSignal::new();
            let mut pool = JoinSet::new();
            for worker in 0..workers {
                pool.spawn(pull_worker(
                    worker,
                    queue.clone(),
                    Arc::clone(&handler),
                    cancel.clone(),
                    halt.clone(),
                ));
            }

            // Drained even after a failure: no handler may outlive the pull.
            let mut failure = None;
            while let Some(joined) = pool.join_next().await {
                let outcome = joined
                    .map_err(|e| TransportError::Unavailable(format!("pull worker aborted: {e}")))
                    .and_then(|r| r);
                if let Err(e) = outcome {
                    warn!(target: "blipsub::emulator", subscription = %subscription, error = %e, "Pull worker failed");
                    halt.fire();
                    failure.get_or_insert(e);
                }
            }

            debug!(target: "blipsub::emulator", subscription = %subscription, "Streaming pull drained");
            failure.map_or(Ok(()), Err)
        }
        .boxed()
    }
}

async fn pull_worker(
    worker: usize,
    queue: SubscriptionQueue,
    handler: DeliveryHandler,
    cancel: CancellationSignal,
    halt: CancellationSignal,
) -> Result<(), TransportError> {
    loop {
        let pending = tokio::select! {
            biased;
            _ = cancel.fired() => break,
            _ = halt.fired() => break,
            next = queue.rx.recv_async() => next
                .map_err(|_| TransportError::Closed("subscription queue disconnected".into()))?,
        };

        let delivery = queue.delivery(pending);
        let handler = Arc::clone(&handler);
        tokio::task::spawn_blocking(move || handler(delivery))
            .await
            .map_err(|e| TransportError::Unavailable(format!("delivery handler failed: {e}")))?;
    }

    debug!(target: "blipsub::emulator", worker, "Pull worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::TryStreamExt;

    use crate::core::catalog::paginate;

    fn broker() -> InMemoryBroker {
        let broker = InMemoryBroker::new("demo").with_page_size(2);
        for topic in ["a", "b", "c", "d", "e"] {
            broker.create_topic(topic);
        }
        broker
    }

    #[tokio::test]
    async fn pages_topics_by_page_size() {
        let broker = broker();
        let first = broker.list_topics_page(None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let all: Vec<TopicDescriptor> = paginate(|token| broker.list_topics_page(token))
            .try_collect()
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn garbage_page_token_is_rejected() {
        let broker = broker();
        let err = broker
            .list_topics_page(Some("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let broker = broker();
        broker.create_subscription("a", "sub").unwrap();
        assert!(matches!(
            broker.create_subscription("b", "sub"),
            Err(TransportError::Rejected(_))
        ));
        assert!(matches!(
            broker.create_subscription("missing", "other"),
            Err(TransportError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_subscription() {
        let broker = broker();
        broker.create_subscription("a", "s1").unwrap();
        broker.create_subscription("a", "s2").unwrap();

        let id = broker.publish("a", Message::new("hi")).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(broker.backlog("s1"), Some(1));
        assert_eq!(broker.backlog("s2"), Some(1));
    }

    #[test]
    fn dropped_delivery_is_requeued_with_next_attempt() {
        let queue = SubscriptionQueue::new();
        queue.enqueue(Message::new("again"));

        let first = queue.delivery(queue.rx.try_recv().unwrap());
        assert_eq!(first.attempt(), 1);
        drop(first);

        let second = queue.delivery(queue.rx.try_recv().unwrap());
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.message().text(), "again");
        second.ack();
        assert!(queue.rx.is_empty());
    }
}
