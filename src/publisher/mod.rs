//! Backend publishers and the registry the distributor dispatches through.

pub mod kafka;
pub mod log;
pub mod memory;

pub use kafka::KafkaPublisher;
pub use log::LogPublisher;
pub use memory::{MemoryPublisher, PublishedMessage};

use crate::event::ChangeEvent;
use crate::subscription::Backend;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A message-queue backend that accepts events on named topics.
///
/// Implementations must be safe to call concurrently. Failures are
/// reported to the caller but never retried by the distributor; any retry
/// policy belongs to the implementation.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publishes `event` to `topic` on behalf of `client_id`.
    ///
    /// Backends sharing one connection per process may ignore `client_id`.
    async fn publish(&self, client_id: &str, topic: &str, event: &ChangeEvent) -> Result<()>;

    /// Deletes `topic`. `Ok(())` means the backend confirmed the deletion.
    async fn delete_topic(&self, topic: &str) -> Result<()>;
}

/// Maps backend identifiers to publisher instances.
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<Backend, Arc<dyn QueuePublisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Backend, publisher: Arc<dyn QueuePublisher>) {
        self.publishers.insert(backend, publisher);
    }

    pub fn with(mut self, backend: Backend, publisher: Arc<dyn QueuePublisher>) -> Self {
        self.register(backend, publisher);
        self
    }

    pub fn get(&self, backend: &Backend) -> Option<&Arc<dyn QueuePublisher>> {
        self.publishers.get(backend)
    }
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("backends", &self.publishers.keys().collect::<Vec<_>>())
            .finish()
    }
}
