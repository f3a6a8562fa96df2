use common::domain::{DomainError, DomainResult, RouteTarget};
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use ingestion::domain::is_valid_name;
use ingestion::mqtt::{validate_topic_filter, MqttIngestionConfig};
use ingestion::IngestionBridgeConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, read once from the environment at startup.
///
/// Keys are the upper-cased field names without a prefix (`MQTT_HOST`, `MONGO_URI`, ...).
#[derive(Deserialize, Clone)]
pub struct ServiceConfig {
    // MQTT configuration
    /// Broker host name (required)
    pub mqtt_host: Option<String>,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    pub mqtt_user: Option<String>,

    pub mqtt_pass: Option<String>,

    /// Subscription filter
    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default = "default_mqtt_keepalive_secs")]
    pub mqtt_keepalive_secs: u64,

    #[serde(default = "default_mqtt_reconnect_delay_secs")]
    pub mqtt_reconnect_delay_secs: u64,

    #[serde(default = "default_mqtt_reconnect_max_delay_secs")]
    pub mqtt_reconnect_max_delay_secs: u64,

    /// 0 retries forever
    #[serde(default)]
    pub mqtt_max_reconnect_attempts: u32,

    // MongoDB configuration
    /// Connection string (required)
    pub mongo_uri: Option<String>,

    #[serde(default = "default_mongo_db")]
    pub mongo_db: String,

    #[serde(default = "default_mongo_collection")]
    pub mongo_collection: String,

    #[serde(default = "default_mongo_server_selection_timeout_secs")]
    pub mongo_server_selection_timeout_secs: u64,

    // Pipeline configuration
    #[serde(default = "default_failed_queue_file")]
    pub failed_queue_file: PathBuf,

    #[serde(default = "default_pipeline_channel_capacity")]
    pub pipeline_channel_capacity: usize,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    // Telemetry configuration
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "aiotgarage/+/+/presence".to_string()
}

fn default_mqtt_client_id() -> String {
    format!("mqtt-to-mongo-{}", std::process::id())
}

fn default_mqtt_keepalive_secs() -> u64 {
    60
}

fn default_mqtt_reconnect_delay_secs() -> u64 {
    5
}

fn default_mqtt_reconnect_max_delay_secs() -> u64 {
    60
}

fn default_mongo_db() -> String {
    "presence_db".to_string()
}

fn default_mongo_collection() -> String {
    "presence".to_string()
}

fn default_mongo_server_selection_timeout_secs() -> u64 {
    5
}

fn default_failed_queue_file() -> PathBuf {
    PathBuf::from("failed_queue.jsonl")
}

fn default_pipeline_channel_capacity() -> usize {
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "mqtt-to-mongo".to_string()
}

/// Shortest keepalive the broker client accepts without complaint
const MIN_KEEPALIVE_SECS: u64 = 5;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Check required keys and value constraints before any connection is attempted.
    pub fn validate(&self) -> DomainResult<()> {
        let mut missing = Vec::new();
        if present(&self.mqtt_host).is_none() {
            missing.push("MQTT_HOST");
        }
        if present(&self.mongo_uri).is_none() {
            missing.push("MONGO_URI");
        }
        if !missing.is_empty() {
            return Err(DomainError::ConfigError(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        validate_topic_filter(&self.mqtt_topic)?;

        if !is_valid_name(&self.mongo_db) {
            return Err(DomainError::ConfigError(format!(
                "MONGO_DB '{}' must be 1-64 characters of [A-Za-z0-9_-]",
                self.mongo_db
            )));
        }
        if !is_valid_name(&self.mongo_collection) {
            return Err(DomainError::ConfigError(format!(
                "MONGO_COLLECTION '{}' must be 1-64 characters of [A-Za-z0-9_-]",
                self.mongo_collection
            )));
        }
        if self.mqtt_keepalive_secs < MIN_KEEPALIVE_SECS {
            return Err(DomainError::ConfigError(format!(
                "MQTT_KEEPALIVE_SECS must be at least {}",
                MIN_KEEPALIVE_SECS
            )));
        }
        if self.pipeline_channel_capacity == 0 {
            return Err(DomainError::ConfigError(
                "PIPELINE_CHANNEL_CAPACITY must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Connection string; empty until `validate` has passed
    pub fn mongo_uri(&self) -> &str {
        present(&self.mongo_uri).unwrap_or_default()
    }

    pub fn mongo_server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.mongo_server_selection_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn default_target(&self) -> RouteTarget {
        RouteTarget::new(self.mongo_db.clone(), self.mongo_collection.clone())
    }

    pub fn mqtt_ingestion_config(&self) -> MqttIngestionConfig {
        MqttIngestionConfig {
            host: present(&self.mqtt_host).unwrap_or_default().to_string(),
            port: self.mqtt_port,
            username: present(&self.mqtt_user).map(str::to_string),
            password: self.mqtt_pass.clone(),
            topic_filter: self.mqtt_topic.clone(),
            client_id: self.mqtt_client_id.clone(),
            keep_alive_secs: self.mqtt_keepalive_secs,
            reconnect_delay_secs: self.mqtt_reconnect_delay_secs,
            reconnect_max_delay_secs: self.mqtt_reconnect_max_delay_secs,
            max_reconnect_attempts: self.mqtt_max_reconnect_attempts,
        }
    }

    pub fn bridge_config(&self) -> IngestionBridgeConfig {
        IngestionBridgeConfig {
            mqtt: self.mqtt_ingestion_config(),
            default_target: self.default_target(),
            failed_queue_path: self.failed_queue_file.clone(),
            channel_capacity: self.pipeline_channel_capacity,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        let telemetry = TelemetryConfig::new(&self.otel_service_name, &self.log_level);
        if self.otel_enabled {
            telemetry.with_otlp_endpoint(&self.otel_endpoint)
        } else {
            telemetry
        }
    }
}

// Credentials and the connection string stay out of logs
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("mqtt_host", &self.mqtt_host)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_user", &self.mqtt_user)
            .field("mqtt_pass", &self.mqtt_pass.as_ref().map(|_| "<redacted>"))
            .field("mqtt_topic", &self.mqtt_topic)
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("mqtt_keepalive_secs", &self.mqtt_keepalive_secs)
            .field("mqtt_reconnect_delay_secs", &self.mqtt_reconnect_delay_secs)
            .field("mqtt_reconnect_max_delay_secs", &self.mqtt_reconnect_max_delay_secs)
            .field("mqtt_max_reconnect_attempts", &self.mqtt_max_reconnect_attempts)
            .field("mongo_uri", &self.mongo_uri.as_ref().map(|_| "<redacted>"))
            .field("mongo_db", &self.mongo_db)
            .field("mongo_collection", &self.mongo_collection)
            .field(
                "mongo_server_selection_timeout_secs",
                &self.mongo_server_selection_timeout_secs,
            )
            .field("failed_queue_file", &self.failed_queue_file)
            .field("pipeline_channel_capacity", &self.pipeline_channel_capacity)
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .field("log_level", &self.log_level)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}
