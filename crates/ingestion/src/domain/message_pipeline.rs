use crate::domain::{MessageNormalizer, PersistenceWriter, Router, WriteAck, WriteFailure};
use common::domain::RawMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument, Span};

/// Normalizer -> Router -> Writer for every message taken off the ingestion channel
pub struct MessagePipeline {
    normalizer: MessageNormalizer,
    router: Router,
    writer: PersistenceWriter,
}

impl MessagePipeline {
    pub fn new(normalizer: MessageNormalizer, router: Router, writer: PersistenceWriter) -> Self {
        Self {
            normalizer,
            router,
            writer,
        }
    }

    /// Process one message. Failures are logged and reported, never raised.
    pub async fn process(&self, message: RawMessage) -> Result<WriteAck, WriteFailure> {
        // Each message gets its own root span, independent of the consumer loop
        let span = info_span!(
            parent: Span::none(),
            "mqtt_message",
            topic = %message.topic,
            payload_size = message.payload.len(),
            db = tracing::field::Empty,
            coll = tracing::field::Empty,
        );

        async {
            let document = self.normalizer.normalize(&message);
            let target = self.router.route(&document);

            Span::current().record("db", target.db_name.as_str());
            Span::current().record("coll", target.coll_name.as_str());

            self.writer.write(&target, document).await
        }
        .instrument(span)
        .await
    }

    /// Consume the channel in delivery order until it closes or `token` is cancelled.
    pub async fn run(
        &self,
        mut receiver: mpsc::Receiver<RawMessage>,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        info!("message pipeline started");
        let mut processed: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("message pipeline cancellation received");
                    break;
                }
                message = receiver.recv() => {
                    let Some(message) = message else {
                        debug!("ingestion channel closed");
                        break;
                    };
                    // Outcome is already logged by the writer
                    let _ = self.process(message).await;
                    processed += 1;
                }
            }
        }

        info!(processed, "message pipeline stopped");
        Ok(())
    }
}
