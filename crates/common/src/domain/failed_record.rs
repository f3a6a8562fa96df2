use crate::domain::message::NormalizedDocument;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A document whose primary write failed, with everything needed to replay it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub db: String,
    pub coll: String,
    pub document: NormalizedDocument,
    pub error: String,
    pub failed_at: String,
}

impl FailedRecord {
    pub fn new(
        db: impl Into<String>,
        coll: impl Into<String>,
        document: NormalizedDocument,
        error: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
            document,
            error: error.into(),
            failed_at: failed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Append-only outbox for records that could not be persisted.
///
/// There is no read operation; reprocessing happens offline.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FailureQueue: Send + Sync {
    /// Durably append one record. Appends never interleave.
    async fn append(&self, record: &FailedRecord) -> DomainResult<()>;
}
