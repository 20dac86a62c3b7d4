#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use blipsub::broker::{BrokerClient, DeliveryHandler, Page, PublishFuture};
use blipsub::core::cancel::CancellationSignal;
use blipsub::core::catalog::{SubscriptionDescriptor, TopicDescriptor};
use blipsub::core::message::{Message, MessageId};
use blipsub::core::subscriber::{AckHandle, AckOutcome, Delivery};
use blipsub::TransportError;

pub const PROJECT: &str = "test-project";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        blipsub::logging::init_logging();
    });
}

/// Chains `items` into pages whose tokens are the next page's index.
pub fn pages<T: Clone>(items: Vec<Vec<T>>) -> Vec<Result<Page<T>, TransportError>> {
    let count = items.len();
    items
        .into_iter()
        .enumerate()
        .map(|(i, items)| {
            Ok(Page {
                items,
                next_page_token: (i + 1 < count).then(|| (i + 1).to_string()),
            })
        })
        .collect()
}

/// How the scripted transport should behave during a streaming pull.
#[derive(Debug, Clone)]
pub struct PullScript {
    /// Messages available before the transport runs dry.
    pub deliveries: usize,
    /// Parallel delivery threads.
    pub workers: usize,
    /// Fail the pull once this many deliveries have been handed out.
    pub fail_after: Option<usize>,
    /// Vary handler timing per delivery.
    pub jitter: bool,
}

impl Default for PullScript {
    fn default() -> Self {
        Self {
            deliveries: 0,
            workers: 1,
            fail_after: None,
            jitter: false,
        }
    }
}

/// What the scripted transport saw.
#[derive(Debug, Default)]
pub struct Ledger {
    pub list_calls: AtomicUsize,
    pub dispatched: AtomicUsize,
    pub acks: AtomicUsize,
    pub nacks: AtomicUsize,
    /// Acks that arrived after the cancel signal had already fired.
    pub acks_after_cancel: AtomicUsize,
}

impl Ledger {
    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn nacks(&self) -> usize {
        self.nacks.load(Ordering::SeqCst)
    }

    pub fn acks_after_cancel(&self) -> usize {
        self.acks_after_cancel.load(Ordering::SeqCst)
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// A `BrokerClient` whose every answer is fixed up front.
pub struct ScriptedBroker {
    pub topic_pages: Vec<Result<Page<TopicDescriptor>, TransportError>>,
    pub subscription_pages: HashMap<String, Vec<Result<Page<SubscriptionDescriptor>, TransportError>>>,
    pub publish_outcome: Result<MessageId, TransportError>,
    pub pull: PullScript,
    pub ledger: Arc<Ledger>,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self {
            topic_pages: pages::<TopicDescriptor>(vec![vec![]]),
            subscription_pages: HashMap::new(),
            publish_outcome: Ok(MessageId::from("1")),
            pull: PullScript::default(),
            ledger: Arc::new(Ledger::default()),
        }
    }
}

fn page_at<T: Clone>(
    pages: &[Result<Page<T>, TransportError>],
    token: Option<String>,
) -> Result<Page<T>, TransportError> {
    let index = token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
    pages
        .get(index)
        .cloned()
        .unwrap_or_else(|| Ok(Page::last(Vec::new())))
}

impl BrokerClient for ScriptedBroker {
    fn project(&self) -> &str {
        PROJECT
    }

    fn list_topics_page(
        &self,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<TopicDescriptor>, TransportError>> {
        self.ledger.list_calls.fetch_add(1, Ordering::SeqCst);
        future::ready(page_at(&self.topic_pages, page_token)).boxed()
    }

    fn list_subscriptions_page(
        &self,
        topic: &str,
        page_token: Option<String>,
    ) -> BoxFuture<'_, Result<Page<SubscriptionDescriptor>, TransportError>> {
        self.ledger.list_calls.fetch_add(1, Ordering::SeqCst);
        let page = match self.subscription_pages.get(topic) {
            Some(pages) => page_at(pages, page_token),
            None => Err(TransportError::NotFound(format!("topic {topic}"))),
        };
        future::ready(page).boxed()
    }

    fn publish(&self, _topic: &str, _message: Message) -> PublishFuture {
        let outcome = self.publish_outcome.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            outcome
        }
        .boxed()
    }

    fn streaming_pull(
        &self,
        _subscription: &str,
        handler: DeliveryHandler,
        cancel: CancellationSignal,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        let script = self.pull.clone();
        let ledger = Arc::clone(&self.ledger);

        async move {
            let next = Arc::new(AtomicUsize::new(0));
            let workers: Vec<_> = (0..script.workers)
                .map(|_| {
                    let script = script.clone();
                    let ledger = Arc::clone(&ledger);
                    let handler = Arc::clone(&handler);
                    let cancel = cancel.clone();
                    let next = Arc::clone(&next);
                    tokio::task::spawn_blocking(move || loop {
                        if cancel.is_fired() {
                            return Ok(());
                        }
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        if script.fail_after.is_some_and(|limit| i >= limit) {
                            return Err(TransportError::Unavailable("connection reset".into()));
                        }
                        if i >= script.deliveries {
                            return Ok(());
                        }

                        ledger.dispatched.fetch_add(1, Ordering::SeqCst);
                        if script.jitter {
                            std::thread::sleep(Duration::from_millis((i as u64 * 7) % 5));
                        }

                        let sink = Arc::clone(&ledger);
                        let observed = cancel.clone();
                        let ack = AckHandle::new(move |outcome| {
                            if outcome == AckOutcome::Ack && observed.is_fired() {
                                sink.acks_after_cancel.fetch_add(1, Ordering::SeqCst);
                            }
                            let tally = match outcome {
                                AckOutcome::Ack => &sink.acks,
                                AckOutcome::Nack => &sink.nacks,
                            };
                            tally.fetch_add(1, Ordering::SeqCst);
                        });
                        let message = Message::new(format!("message {i}"))
                            .confirmed(MessageId::from(i.to_string()));
                        handler(Delivery::new(message, 1, ack));
                    })
                })
                .collect();

            let mut outcome = Ok(());
            for worker in workers {
                let result = worker
                    .await
                    .map_err(|e| TransportError::Unavailable(e.to_string()))
                    .and_then(|r| r);
                if outcome.is_ok() {
                    outcome = result;
                }
            }
            outcome
        }
        .boxed()
    }
}
