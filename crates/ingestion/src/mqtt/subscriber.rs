use crate::mqtt::{delivered_topic_filter, topic_matches, IngestionState, MqttIngestionConfig};
use common::domain::{DomainError, DomainResult, RawMessage};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Capacity of the request queue between the client handle and the event loop
const CLIENT_REQUEST_CAPACITY: usize = 10;
/// Upper bound on flushing DISCONNECT to the broker during shutdown
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the broker connection and feeds received publishes into the pipeline channel.
pub struct MqttIngestionClient {
    config: MqttIngestionConfig,
    sender: mpsc::Sender<RawMessage>,
    state: watch::Sender<IngestionState>,
}

impl MqttIngestionClient {
    pub fn new(config: MqttIngestionConfig, sender: mpsc::Sender<RawMessage>) -> Self {
        let (state, _) = watch::channel(IngestionState::Disconnected);
        Self {
            config,
            sender,
            state,
        }
    }

    /// Observe connection state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<IngestionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> IngestionState {
        *self.state.borrow()
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);

        if let Some(username) = self.config.username.as_deref().filter(|u| !u.is_empty()) {
            options.set_credentials(username, self.config.password.clone().unwrap_or_default());
        }

        options
    }

    fn transition(&self, next: IngestionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "ingestion state changed");
        }
    }

    /// Run until `token` is cancelled.
    ///
    /// Connection errors are retried with backoff; the event loop re-establishes the
    /// TCP session on the next poll. Only exhausting `max_reconnect_attempts` or losing
    /// the pipeline channel ends the run with an error.
    #[instrument(
        name = "mqtt_ingestion",
        skip_all,
        fields(
            host = %self.config.host,
            port = self.config.port,
            topic_filter = %self.config.topic_filter,
        )
    )]
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<()> {
        info!(client_id = %self.config.client_id, "starting MQTT ingestion client");

        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), CLIENT_REQUEST_CAPACITY);
        self.transition(IngestionState::Connecting);

        let mut failed_attempts: u32 = 0;

        let result = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("cancellation received, disconnecting from broker");
                    release_connection(&client, &mut eventloop).await;
                    break Ok(());
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            info!(code = ?ack.code, session_present = ack.session_present, "connected to MQTT broker");
                            failed_attempts = 0;
                            // Clean sessions drop subscriptions, so subscribe on every connect
                            if let Err(e) = client
                                .subscribe(&self.config.topic_filter, QoS::AtLeastOnce)
                                .await
                            {
                                error!(error = %e, "failed to request subscription");
                            }
                        }
                        Ok(Event::Incoming(Packet::SubAck(suback))) => {
                            if suback
                                .return_codes
                                .iter()
                                .any(|code| matches!(code, SubscribeReasonCode::Failure))
                            {
                                error!(return_codes = ?suback.return_codes, "broker rejected subscription");
                            } else {
                                info!("subscribed to MQTT topic filter");
                                self.transition(IngestionState::Subscribed);
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let forwarded = tokio::select! {
                                _ = token.cancelled() => continue,
                                forwarded = forward_message(
                                    &self.config.topic_filter,
                                    &publish.topic,
                                    &publish.payload,
                                    &self.sender,
                                ) => forwarded,
                            };
                            if let Err(e) = forwarded {
                                error!(error = %e, "pipeline channel closed, stopping ingestion");
                                release_connection(&client, &mut eventloop).await;
                                break Err(anyhow::Error::new(e));
                            }
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            warn!("broker sent DISCONNECT");
                            self.transition(IngestionState::Disconnected);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            self.transition(IngestionState::Disconnected);
                            log_connection_error(&e);

                            failed_attempts += 1;
                            if self.config.retries_exhausted(failed_attempts) {
                                error!(
                                    attempts = failed_attempts,
                                    "max reconnect attempts reached, stopping MQTT ingestion"
                                );
                                break Err(anyhow::anyhow!(
                                    "MQTT broker unreachable after {} attempts: {}",
                                    failed_attempts,
                                    e
                                ));
                            }

                            let delay = self.config.reconnect_delay(failed_attempts);
                            warn!(
                                attempt = failed_attempts,
                                delay_ms = delay.as_millis() as u64,
                                "reconnecting to MQTT broker"
                            );

                            tokio::select! {
                                _ = token.cancelled() => break Ok(()),
                                _ = tokio::time::sleep(delay) => {}
                            }
                            self.transition(IngestionState::Connecting);
                        }
                    }
                }
            }
        };

        self.transition(IngestionState::Disconnected);
        info!("MQTT ingestion client stopped");
        result
    }
}

/// Push one publish onto the pipeline channel.
///
/// Returns `Ok(false)` when the topic is outside the configured filter and the
/// message was skipped. Waits for channel capacity, which backpressures the broker loop.
pub(crate) async fn forward_message(
    topic_filter: &str,
    topic: &str,
    payload: &[u8],
    sender: &mpsc::Sender<RawMessage>,
) -> DomainResult<bool> {
    if !topic_matches(delivered_topic_filter(topic_filter), topic) {
        warn!(topic = %topic, topic_filter = %topic_filter, "topic outside subscription filter, skipping message");
        return Ok(false);
    }

    debug!(topic = %topic, payload_size = payload.len(), "received MQTT message");

    sender
        .send(RawMessage::new(topic, payload))
        .await
        .map_err(|_| DomainError::BrokerError("pipeline channel closed".to_string()))?;

    Ok(true)
}

fn log_connection_error(error: &ConnectionError) {
    match error {
        ConnectionError::ConnectionRefused(code) => {
            error!(code = ?code, "MQTT connect refused by broker");
        }
        other => {
            error!(error = %other, "MQTT connection error");
        }
    }
}

/// Send DISCONNECT and poll until it is written, bounded by a timeout.
async fn release_connection(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "disconnect request not accepted");
        return;
    }

    let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if flushed.is_err() {
        debug!("timed out flushing DISCONNECT to broker");
    } else {
        info!("disconnected from MQTT broker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_matching_message() {
        let (sender, mut receiver) = mpsc::channel(1);

        let forwarded = forward_message(
            "aiotgarage/+/+/presence",
            "aiotgarage/hall/cam1/presence",
            br#"{"person count": 2}"#,
            &sender,
        )
        .await
        .unwrap();

        assert!(forwarded);
        let message = receiver.recv().await.unwrap();
        assert_eq!(message.topic, "aiotgarage/hall/cam1/presence");
        assert_eq!(message.payload, br#"{"person count": 2}"#.to_vec());
    }

    #[tokio::test]
    async fn test_forward_skips_topic_outside_filter() {
        let (sender, mut receiver) = mpsc::channel(1);

        let forwarded = forward_message("aiotgarage/+/+/presence", "other/topic", b"{}", &sender)
            .await
            .unwrap();

        assert!(!forwarded);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_reports_closed_channel() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);

        let result = forward_message("#", "a/b", b"x", &sender).await;

        assert!(matches!(result, Err(DomainError::BrokerError(_))));
    }

    #[tokio::test]
    async fn test_forward_shared_subscription_message() {
        let (sender, mut receiver) = mpsc::channel(1);

        let forwarded = forward_message(
            "$share/bridges/aiotgarage/+/+/presence",
            "aiotgarage/hall/cam1/presence",
            b"{}",
            &sender,
        )
        .await
        .unwrap();

        assert!(forwarded);
        assert_eq!(receiver.recv().await.unwrap().topic, "aiotgarage/hall/cam1/presence");
    }

    #[test]
    fn test_new_client_starts_disconnected() {
        let (sender, _receiver) = mpsc::channel(1);
        let client = MqttIngestionClient::new(MqttIngestionConfig::default(), sender);

        assert_eq!(client.state(), IngestionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts_against_closed_port() {
        let (sender, _receiver) = mpsc::channel(1);
        let config = MqttIngestionConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            reconnect_delay_secs: 0,
            reconnect_max_delay_secs: 0,
            max_reconnect_attempts: 2,
            ..Default::default()
        };
        let client = MqttIngestionClient::new(config, sender);
        let mut state = client.subscribe_state();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.run(CancellationToken::new()),
        )
        .await
        .expect("run should stop after exhausting attempts");

        assert!(result.is_err());
        assert_eq!(*state.borrow_and_update(), IngestionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_returns_ok_when_cancelled_while_reconnecting() {
        let (sender, _receiver) = mpsc::channel(1);
        let config = MqttIngestionConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            reconnect_delay_secs: 30,
            ..Default::default()
        };
        let client = MqttIngestionClient::new(config, sender);
        let token = CancellationToken::new();
        let cancel = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(10), client.run(token))
            .await
            .expect("run should observe cancellation");

        assert!(result.is_ok());
    }
}
