use super::QueuePublisher;
use crate::event::ChangeEvent;
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Publisher that only logs what it would have sent. Keeps no state.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl LogPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueuePublisher for LogPublisher {
    async fn publish(&self, client_id: &str, topic: &str, event: &ChangeEvent) -> Result<()> {
        info!(
            client_id,
            topic,
            kind = event.kind(),
            rows = event.row_count(),
            "Dry run: message not published"
        );
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> Result<()> {
        info!(topic, "Dry run: topic not deleted");
        Ok(())
    }
}
