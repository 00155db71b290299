//! Durable storage of records as index views.

use std::sync::Arc;

use async_trait::async_trait;
use capture_core::ContentHash;
use capture_store::{ImageStore, OnConflictStrategy, StoreContext, Table, Tuple};
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::proof::{IndexedProofView, Proof};

pub const PROOF_TABLE: &str = "ProofRepository_proof";

/// Where assembled records are kept.
#[async_trait]
pub trait ProofRepository: Send + Sync {
    /// Persist `proof`, returning its id. Adding the same record twice is
    /// a no-op.
    async fn add(&self, proof: &Proof) -> Result<ContentHash, RepositoryError>;

    async fn get_all(&self) -> Result<Vec<Proof>, RepositoryError>;

    /// Forget `proof` and destroy its payloads.
    async fn remove(&self, proof: &Proof) -> Result<(), RepositoryError>;
}

/// Row: the record id alongside its index view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProof {
    pub id: ContentHash,
    #[serde(flatten)]
    pub view: IndexedProofView,
}

impl Tuple for StoredProof {
    type Key = ContentHash;

    fn key(&self) -> ContentHash {
        self.id.clone()
    }
}

/// [`ProofRepository`] over a table of [`StoredProof`] rows.
#[derive(Debug)]
pub struct TableProofRepository {
    store: Arc<ImageStore>,
    table: Arc<Table<StoredProof>>,
}

impl TableProofRepository {
    pub fn new(context: &StoreContext, store: Arc<ImageStore>) -> Result<Self, RepositoryError> {
        Ok(Self {
            store,
            table: context.database.table(PROOF_TABLE)?,
        })
    }

    /// Look up a record by id.
    pub async fn get(&self, id: &ContentHash) -> Result<Option<Proof>, RepositoryError> {
        Ok(self
            .table
            .get(id)
            .await?
            .map(|row| Proof::from_indexed_view(self.store.clone(), row.view)))
    }
}

#[async_trait]
impl ProofRepository for TableProofRepository {
    async fn add(&self, proof: &Proof) -> Result<ContentHash, RepositoryError> {
        let id = proof.get_id().await?;
        let written = self
            .table
            .insert(
                vec![StoredProof {
                    id: id.clone(),
                    view: proof.get_indexed_view(),
                }],
                OnConflictStrategy::Ignore,
            )
            .await?;
        if written.is_empty() {
            tracing::debug!(id = %id, "record already stored");
        } else {
            tracing::info!(id = %id, "record stored");
        }
        Ok(id)
    }

    async fn get_all(&self) -> Result<Vec<Proof>, RepositoryError> {
        Ok(self
            .table
            .query_all()
            .await?
            .into_iter()
            .map(|row| Proof::from_indexed_view(self.store.clone(), row.view))
            .collect())
    }

    async fn remove(&self, proof: &Proof) -> Result<(), RepositoryError> {
        let id = proof.get_id().await?;
        self.table.delete(&id).await?;
        proof.destroy().await?;
        tracing::info!(id = %id, "record removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{PayloadMeta, Payloads, Signatures};
    use crate::truth::Truth;
    use capture_core::Timestamp;
    use capture_store::{FileStore, ImageThumbnailer};

    async fn setup() -> (TableProofRepository, Proof, Arc<ImageStore>) {
        let ctx = StoreContext::in_memory();
        let store = Arc::new(ImageStore::new(&ctx, Arc::new(ImageThumbnailer), 100).unwrap());
        let repo = TableProofRepository::new(&ctx, store.clone()).unwrap();
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        let proof = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(3)), Signatures::new())
            .await
            .unwrap();
        (repo, proof, store)
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let (repo, proof, _) = setup().await;
        let a = repo.add(&proof).await.unwrap();
        let b = repo.add(&proof).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        let fetched = repo.get(&a).await.unwrap().unwrap();
        assert_eq!(fetched.get_indexed_view(), proof.get_indexed_view());
    }

    #[tokio::test]
    async fn remove_destroys_payloads() {
        let (repo, proof, store) = setup().await;
        repo.add(&proof).await.unwrap();
        repo.remove(&proof).await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
        for key in proof.indexed_payloads().keys() {
            assert!(!store.exists(key).await.unwrap());
        }
    }
}
