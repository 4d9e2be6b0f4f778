pub mod config;
pub mod counters;
pub mod distributor;
pub mod error;
pub mod event;
pub mod ingest;
pub mod subscription;
pub mod topic;

pub mod publisher;

pub use config::Config;
pub use distributor::Distributor;
pub use error::{Error, Result};
pub use event::ChangeEvent;
pub use subscription::{Backend, Subscription};
