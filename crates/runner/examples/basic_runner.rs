//! Producer/consumer pair under the bridge runner
//!
//! A producer pushes readings into a bounded channel and a consumer drains it,
//! the same shape as broker ingestion feeding the persistence pipeline.
//! Ctrl+C stops both; closers then run in registration order.
//!
//! Run with: cargo run -p bridge-runner --example basic_runner

use bridge_runner::Runner;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (sender, mut receiver) = mpsc::channel::<u64>(4);

    let runner = Runner::new()
        .with_app_process(move |ctx| async move {
            let mut reading = 0;
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        tracing::info!(last_reading = reading, "Producer stopping");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(Duration::from_millis(500)) => {
                        reading += 1;
                        sender
                            .send(reading)
                            .await
                            .map_err(|_| anyhow::anyhow!("consumer went away"))?;
                    }
                }
            }
        })
        .with_app_process(move |ctx| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => {
                        tracing::info!("Consumer stopping");
                        return Ok(());
                    }
                    reading = receiver.recv() => match reading {
                        Some(value) => tracing::info!(value, "Stored reading"),
                        None => return Ok(()),
                    },
                }
            }
        })
        .with_closer(|| async move {
            tracing::info!("Closing storage connection");
            Ok(())
        })
        .with_closer(|| async move {
            tracing::info!("Flushing telemetry");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(5));

    tracing::info!("Press Ctrl+C to trigger graceful shutdown");
    runner.run().await;
}
