use super::QueuePublisher;
use crate::config::KafkaConfig;
use crate::event::ChangeEvent;
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions};
use rdkafka::client::DefaultClientContext;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Stream backend: one shared producer and admin client per process.
pub struct KafkaPublisher {
    producer: FutureProducer,
    admin_client: AdminClient<DefaultClientContext>,
    message_timeout: Duration,
    admin_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let brokers = config.brokers.join(",");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set(
                "queue.buffering.max.kbytes",
                buffering_kbytes(config.buffer_memory).to_string(),
            )
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()?;

        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .create()?;

        Ok(Self {
            producer,
            admin_client,
            message_timeout: Duration::from_millis(config.message_timeout_ms),
            admin_timeout: Duration::from_secs(config.admin_timeout_secs),
        })
    }
}

/// librdkafka sizes its producer queue in kilobytes.
fn buffering_kbytes(buffer_memory: usize) -> usize {
    (buffer_memory / 1024).max(1)
}

#[async_trait]
impl QueuePublisher for KafkaPublisher {
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    async fn publish(&self, _client_id: &str, topic: &str, event: &ChangeEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let key = event.table_key();
        let record = FutureRecord::to(topic).payload(&payload).key(&key);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.message_timeout))
            .await
            .map_err(|(e, _)| Error::Kafka(e))?;

        debug!(partition, offset, "Delivered to Kafka");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_topic(&self, topic: &str) -> Result<()> {
        let opts = AdminOptions::new().operation_timeout(Some(self.admin_timeout));

        let results = self.admin_client.delete_topics(&[topic], &opts).await?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully deleted topic: {}", topic);
                }
                Err((topic, error)) => {
                    return Err(Error::Publish {
                        topic,
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
