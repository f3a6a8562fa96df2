use chrono::Utc;
use common::domain::{
    DocumentRepository, DomainError, FailedRecord, FailureQueue, NormalizedDocument, RouteTarget,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Successful primary write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    pub target: RouteTarget,
}

/// Primary write failed. `queued` tells whether the record reached the failure queue.
#[derive(Debug)]
pub struct WriteFailure {
    pub target: RouteTarget,
    pub source: DomainError,
    pub queued: bool,
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "write to {} failed ({}), queued: {}",
            self.target, self.source, self.queued
        )
    }
}

impl std::error::Error for WriteFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Commits documents to storage, one attempt per message.
///
/// Failed writes are appended to the failure queue with full addressing; if that
/// append also fails the record is dropped and logged.
pub struct PersistenceWriter {
    repository: Arc<dyn DocumentRepository>,
    failure_queue: Arc<dyn FailureQueue>,
}

impl PersistenceWriter {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        failure_queue: Arc<dyn FailureQueue>,
    ) -> Self {
        Self {
            repository,
            failure_queue,
        }
    }

    #[instrument(
        skip_all,
        fields(db = %target.db_name, coll = %target.coll_name, topic = document.topic().unwrap_or("<no-topic>"))
    )]
    pub async fn write(
        &self,
        target: &RouteTarget,
        document: NormalizedDocument,
    ) -> Result<WriteAck, WriteFailure> {
        let topic = document.topic().unwrap_or("<no-topic>").to_string();

        match self.repository.insert_document(target, &document).await {
            Ok(()) => {
                info!(topic = %topic, target = %target, "stored document");
                Ok(WriteAck {
                    target: target.clone(),
                })
            }
            Err(e) => {
                error!(
                    topic = %topic,
                    target = %target,
                    error = %e,
                    "insert failed, queueing document to failure queue"
                );
                let queued = self.enqueue_failed(target, document, &e).await;
                Err(WriteFailure {
                    target: target.clone(),
                    source: e,
                    queued,
                })
            }
        }
    }

    async fn enqueue_failed(
        &self,
        target: &RouteTarget,
        document: NormalizedDocument,
        cause: &DomainError,
    ) -> bool {
        let record = FailedRecord::new(
            target.db_name.clone(),
            target.coll_name.clone(),
            document,
            cause.to_string(),
            Utc::now(),
        );

        match self.failure_queue.append(&record).await {
            Ok(()) => {
                warn!(target = %target, "document queued for reprocessing");
                true
            }
            Err(e) => {
                error!(target = %target, error = %e, "failure queue append failed, dropping document");
                false
            }
        }
    }
}
