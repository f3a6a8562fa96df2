use async_trait::async_trait;
use common::domain::{
    DocumentRepository, DomainError, DomainResult, NormalizedDocument, RouteTarget,
};
use common::mongo::MongoClient;
use mongodb::bson::{self, Document};
use tracing::debug;

/// MongoDB implementation of DocumentRepository
#[derive(Clone)]
pub struct MongoDocumentRepository {
    client: MongoClient,
}

impl MongoDocumentRepository {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }
}

/// Convert a JSON document to BSON. Fails for values BSON cannot hold,
/// such as unsigned integers above `i64::MAX`.
pub fn to_bson_document(document: &NormalizedDocument) -> DomainResult<Document> {
    bson::to_document(document.as_map())
        .map_err(|e| DomainError::SerializationError(format!("document is not BSON-encodable: {}", e)))
}

#[async_trait]
impl DocumentRepository for MongoDocumentRepository {
    async fn insert_document(
        &self,
        target: &RouteTarget,
        document: &NormalizedDocument,
    ) -> DomainResult<()> {
        let bson_document = to_bson_document(document)?;

        let result = self
            .client
            .collection(&target.db_name, &target.coll_name)
            .insert_one(bson_document)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(
            target = %target,
            inserted_id = %result.inserted_id,
            "inserted document"
        );

        Ok(())
    }
}
