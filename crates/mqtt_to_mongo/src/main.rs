mod config;

use bridge_runner::Runner;
use common::mongo::MongoClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use ingestion::IngestionBridge;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (JSON logs, plus OpenTelemetry traces and logs when enabled)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration, not starting");
        shutdown_telemetry(telemetry_providers);
        std::process::exit(1);
    }

    info!(
        otel_enabled = config.otel_enabled,
        topic_filter = %config.mqtt_topic,
        default_target = %config.default_target(),
        "Starting mqtt-to-mongo bridge"
    );
    debug!("Configuration: {:?}", config);

    let mongo_client = match connect_storage(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to MongoDB: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let bridge = IngestionBridge::new(mongo_client.clone(), config.bridge_config());

    let mut runner = Runner::new();
    for (name, process) in bridge.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    // The broker connection is released by the ingestion process on cancellation,
    // so by the time closers run only storage and telemetry remain.
    runner = runner
        .with_closer(move || async move {
            mongo_client.close().await;
            Ok(())
        })
        .with_closer(move || async move {
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(config.shutdown_timeout());

    runner.run().await;
}

async fn connect_storage(config: &ServiceConfig) -> anyhow::Result<MongoClient> {
    info!("Connecting to MongoDB...");
    let client =
        MongoClient::connect(config.mongo_uri(), config.mongo_server_selection_timeout()).await?;
    client.ping().await?;
    info!("Connected to MongoDB");
    Ok(client)
}
