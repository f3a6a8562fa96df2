use crate::domain::message::{NormalizedDocument, RouteTarget};
use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// Repository trait for document persistence
/// Infrastructure layer (e.g., MongoDB) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert one document into the addressed database and collection.
    ///
    /// Exactly one insert attempt is made; implementations must not retry.
    async fn insert_document(
        &self,
        target: &RouteTarget,
        document: &NormalizedDocument,
    ) -> DomainResult<()>;
}
