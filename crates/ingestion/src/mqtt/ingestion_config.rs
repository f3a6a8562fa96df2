use std::time::Duration;

/// Broker connection settings for the ingestion client
#[derive(Debug, Clone)]
pub struct MqttIngestionConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Subscription filter, e.g. `aiotgarage/+/+/presence`
    pub topic_filter: String,
    pub client_id: String,
    pub keep_alive_secs: u64,

    /// First delay before reconnecting after a connection error (default: 5 seconds)
    pub reconnect_delay_secs: u64,

    /// Ceiling for the doubling reconnect delay (default: 60 seconds)
    pub reconnect_max_delay_secs: u64,

    /// Consecutive failed attempts before giving up; 0 retries forever
    pub max_reconnect_attempts: u32,
}

impl Default for MqttIngestionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            topic_filter: "aiotgarage/+/+/presence".to_string(),
            client_id: "mqtt-to-mongo".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_secs: 5,
            reconnect_max_delay_secs: 60,
            max_reconnect_attempts: 0,
        }
    }
}

impl MqttIngestionConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Delay before reconnect attempt `attempt` (1-based): doubles each time, capped.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let secs = self
            .reconnect_delay_secs
            .saturating_mul(1u64 << exponent)
            .min(self.reconnect_max_delay_secs.max(self.reconnect_delay_secs));
        Duration::from_secs(secs)
    }

    pub fn retries_exhausted(&self, failed_attempts: u32) -> bool {
        self.max_reconnect_attempts > 0 && failed_attempts >= self.max_reconnect_attempts
    }
}
