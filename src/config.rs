use crate::subscription::{deserialize_subscriptions, Subscription, SubscriptionSet};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub distributor: DistributorConfig,
    #[serde(default, deserialize_with = "deserialize_subscriptions")]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_buffer_memory")]
    pub buffer_memory: usize,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default = "default_admin_timeout_secs")]
    pub admin_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistributorConfig {
    /// How often the throughput reporter samples the publish counter.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Log routed messages for every backend instead of publishing them.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            dry_run: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BINLOG_DISTRIBUTOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn subscription_set(&self) -> SubscriptionSet {
        SubscriptionSet::new(self.subscriptions.iter().cloned())
    }
}

impl KafkaConfig {
    /// Settings for `brokers` with every tunable at its default.
    pub fn new(brokers: Vec<String>) -> Self {
        Self {
            brokers,
            compression: default_compression(),
            acks: default_acks(),
            linger_ms: default_linger_ms(),
            batch_size: default_batch_size(),
            buffer_memory: default_buffer_memory(),
            message_timeout_ms: default_message_timeout_ms(),
            admin_timeout_secs: default_admin_timeout_secs(),
        }
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_buffer_memory() -> usize {
    33_554_432 // 32MB
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_admin_timeout_secs() -> u64 {
    30
}

fn default_sample_interval_secs() -> u64 {
    60
}
