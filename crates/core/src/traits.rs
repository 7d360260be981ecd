use crate::config::{index_location, EmbeddingModelSpec, IndexKind};
use crate::embeddings::Embedder;
use crate::models::{Chunk, SearchResult};
use crate::store::IndexHandle;
use crate::SearchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One persistence strategy for vector indexes. Every kind exposes the same
/// build/load/query contract, so callers never branch on the kind.
#[async_trait]
pub trait VectorIndexStore: Send + Sync {
    fn kind(&self) -> IndexKind;

    fn root(&self) -> &Path;

    fn location(&self, model: &EmbeddingModelSpec) -> PathBuf {
        index_location(self.root(), self.kind(), model)
    }

    /// Embeds `chunks` and persists a fresh index, replacing anything stored
    /// for the same model and kind.
    async fn build(
        &self,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Result<IndexHandle, SearchError>;

    /// `Ok(None)` means nothing has been built for this model yet.
    async fn load(&self, model: &EmbeddingModelSpec) -> Result<Option<IndexHandle>, SearchError>;

    fn query(
        &self,
        handle: &IndexHandle,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if handle.kind() != self.kind() {
            return Err(SearchError::InvalidArgument(format!(
                "{} index handed to the {} store",
                handle.kind(),
                self.kind()
            )));
        }

        handle.search(query_vector, k)
    }
}
