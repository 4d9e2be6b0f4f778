use super::QueuePublisher;
use crate::event::ChangeEvent;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub client_id: String,
    pub topic: String,
    pub event: ChangeEvent,
}

/// Publisher that keeps everything in memory.
///
/// Used by the test suite to observe what the distributor routed. Topics
/// listed as failing reject both publishes and deletions.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    deleted: Mutex<Vec<String>>,
    failing_topics: HashSet<String>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            failing_topics: topics.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, topic: &str) -> Result<()> {
        if self.failing_topics.contains(topic) {
            return Err(Error::Publish {
                topic: topic.to_string(),
                message: "topic configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QueuePublisher for MemoryPublisher {
    async fn publish(&self, client_id: &str, topic: &str, event: &ChangeEvent) -> Result<()> {
        self.check(topic)?;
        debug!(client_id, topic, kind = event.kind(), "Recorded message");

        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                client_id: client_id.to_string(),
                topic: topic.to_string(),
                event: event.clone(),
            });
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> Result<()> {
        self.check(topic)?;
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.to_string());
        Ok(())
    }
}
