//! Topic and subscription enumeration.
//!
//! Listing is lazy (`topics`, `subscriptions` return streams that fetch page by
//! page) and restartable (each call starts from the first page). The `list_*`
//! helpers collect a whole enumeration or fail: no partial results.

pub mod pager;

use futures::stream::{Stream, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::broker::client::BrokerClient;
use crate::core::error::{PubSubError, Result, TransportError};

pub use pager::paginate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicDescriptor {
    project: String,
    id: String,
}

impl TopicDescriptor {
    pub fn new(project: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

}

/// Fully-qualified resource name, `projects/{project}/topics/{id}`.
impl fmt::Display for TopicDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/topics/{}", self.project, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionDescriptor {
    project: String,
    id: String,
    topic: String,
}

impl SubscriptionDescriptor {
    pub fn new(
        project: impl Into<String>,
        id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            id: id.into(),
            topic: topic.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short id of the topic this subscription is attached to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Fully-qualified resource name, `projects/{project}/subscriptions/{id}`.
impl fmt::Display for SubscriptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/subscriptions/{}", self.project, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDescriptor {
    Topic(TopicDescriptor),
    Subscription(SubscriptionDescriptor),
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityDescriptor::Topic(t) => t.fmt(f),
            EntityDescriptor::Subscription(s) => s.fmt(f),
        }
    }
}

/// What to enumerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// All topics of the client's project.
    Project,
    /// Subscriptions attached to one topic.
    Topic(String),
}

impl fmt::Display for ListScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListScope::Project => f.write_str("topics"),
            ListScope::Topic(topic) => write!(f, "subscriptions of topic {topic}"),
        }
    }
}

pub struct CatalogLister<C> {
    client: Arc<C>,
}

impl<C: BrokerClient> CatalogLister<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn topics(&self) -> impl Stream<Item = Result<TopicDescriptor, TransportError>> + '_ {
        let client: &C = &self.client;
        paginate(move |token| client.list_topics_page(token))
    }

    pub fn subscriptions<'a>(
        &'a self,
        topic: &'a str,
    ) -> impl Stream<Item = Result<SubscriptionDescriptor, TransportError>> + 'a {
        let client: &C = &self.client;
        paginate(move |token| client.list_subscriptions_page(topic, token))
    }

    pub async fn list(&self, scope: &ListScope) -> Result<Vec<EntityDescriptor>> {
        let listed = match scope {
            ListScope::Project => {
                self.topics()
                    .map_ok(EntityDescriptor::Topic)
                    .try_collect::<Vec<_>>()
                    .await
            }
            ListScope::Topic(topic) => {
                self.subscriptions(topic)
                    .map_ok(EntityDescriptor::Subscription)
                    .try_collect::<Vec<_>>()
                    .await
            }
        };

        match listed {
            Ok(entities) => {
                debug!(
                    target: "blipsub::catalog",
                    project = self.client.project(),
                    %scope,
                    count = entities.len(),
                    "Listing complete"
                );
                Ok(entities)
            }
            Err(source) => {
                warn!(
                    target: "blipsub::catalog",
                    project = self.client.project(),
                    %scope,
                    error = %source,
                    "Listing aborted"
                );
                Err(PubSubError::ListingFailed {
                    scope: scope.to_string(),
                    source,
                })
            }
        }
    }

    pub async fn list_topics(&self) -> Result<Vec<TopicDescriptor>> {
        let entities = self.list(&ListScope::Project).await?;
        Ok(entities
            .into_iter()
            .filter_map(|e| match e {
                EntityDescriptor::Topic(t) => Some(t),
                EntityDescriptor::Subscription(_) => None,
            })
            .collect())
    }

    pub async fn list_subscriptions(&self, topic: &str) -> Result<Vec<SubscriptionDescriptor>> {
        let entities = self.list(&ListScope::Topic(topic.to_owned())).await?;
        Ok(entities
            .into_iter()
            .filter_map(|e| match e {
                EntityDescriptor::Subscription(s) => Some(s),
                EntityDescriptor::Topic(_) => None,
            })
            .collect())
    }
}
