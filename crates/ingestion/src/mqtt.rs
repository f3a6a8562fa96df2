mod ingestion_config;
mod ingestion_state;
pub(crate) mod subscriber;
mod topic;

pub use ingestion_config::MqttIngestionConfig;
pub use ingestion_state::IngestionState;
pub use subscriber::MqttIngestionClient;
pub use topic::{delivered_topic_filter, topic_matches, validate_topic_filter};
