use anyhow::{Context, Result};
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;
use tracing::{debug, info};

/// Shared MongoDB connection handle.
///
/// The driver pools connections internally and is safe to clone across tasks.
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
}

impl MongoClient {
    /// Parse the connection string and build a client whose server selection
    /// is bounded by `server_selection_timeout`.
    pub async fn connect(uri: &str, server_selection_timeout: Duration) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;
        options.server_selection_timeout = Some(server_selection_timeout);
        options.connect_timeout = Some(server_selection_timeout);

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        info!(
            timeout_ms = server_selection_timeout.as_millis() as u64,
            "MongoDB client created"
        );

        Ok(Self { client })
    }

    /// Liveness check against the admin database
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        debug!("MongoDB ping succeeded");
        Ok(())
    }

    pub fn collection(&self, db_name: &str, coll_name: &str) -> Collection<Document> {
        self.client.database(db_name).collection::<Document>(coll_name)
    }

    /// Close all pooled connections. Clones of this handle become unusable.
    pub async fn close(self) {
        info!("Closing MongoDB connection");
        self.client.shutdown().await;
    }
}
