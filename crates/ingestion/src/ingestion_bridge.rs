use crate::domain::{MessageNormalizer, MessagePipeline, PersistenceWriter, Router};
use crate::file::JsonlFailureQueue;
use crate::mongo::MongoDocumentRepository;
use crate::mqtt::{IngestionState, MqttIngestionClient, MqttIngestionConfig};
use bridge_runner::AppProcess;
use common::domain::{DocumentRepository, FailureQueue, RawMessage, RouteTarget};
use common::mongo::MongoClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

pub struct IngestionBridgeConfig {
    pub mqtt: MqttIngestionConfig,
    pub default_target: RouteTarget,
    pub failed_queue_path: PathBuf,
    /// Bound of the channel between the broker loop and the pipeline
    pub channel_capacity: usize,
}

/// Broker ingestion and the processing pipeline, joined by a bounded channel.
pub struct IngestionBridge {
    ingestion_client: MqttIngestionClient,
    pipeline: MessagePipeline,
    receiver: mpsc::Receiver<RawMessage>,
}

impl IngestionBridge {
    pub fn new(mongo_client: MongoClient, config: IngestionBridgeConfig) -> Self {
        let repository = Arc::new(MongoDocumentRepository::new(mongo_client));
        let failure_queue = Arc::new(JsonlFailureQueue::new(config.failed_queue_path.clone()));
        Self::with_components(repository, failure_queue, config)
    }

    pub fn with_components(
        repository: Arc<dyn DocumentRepository>,
        failure_queue: Arc<dyn FailureQueue>,
        config: IngestionBridgeConfig,
    ) -> Self {
        info!(
            default_target = %config.default_target,
            failed_queue = %config.failed_queue_path.display(),
            channel_capacity = config.channel_capacity,
            "Initializing ingestion bridge"
        );

        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));

        let pipeline = MessagePipeline::new(
            MessageNormalizer::new(),
            Router::new(config.default_target),
            PersistenceWriter::new(repository, failure_queue),
        );
        let ingestion_client = MqttIngestionClient::new(config.mqtt, sender);

        Self {
            ingestion_client,
            pipeline,
            receiver,
        }
    }

    pub fn ingestion_state(&self) -> watch::Receiver<IngestionState> {
        self.ingestion_client.subscribe_state()
    }

    /// The broker loop and the pipeline consumer, as named runner processes
    pub fn into_runner_processes(self) -> Vec<(&'static str, AppProcess)> {
        let ingestion_client = self.ingestion_client;
        let pipeline = self.pipeline;
        let receiver = self.receiver;

        let ingestion: AppProcess =
            Box::new(move |ctx| Box::pin(async move { ingestion_client.run(ctx).await }));
        let processing: AppProcess =
            Box::new(move |ctx| Box::pin(async move { pipeline.run(receiver, ctx).await }));

        vec![("mqtt_ingestion", ingestion), ("message_pipeline", processing)]
    }
}
