pub mod journal;
pub mod snapshot;

pub use journal::JournalStore;
pub use snapshot::SnapshotStore;

use crate::config::IndexKind;
use crate::traits::VectorIndexStore;
use std::path::PathBuf;

pub fn open_store(kind: IndexKind, root: impl Into<PathBuf>) -> Box<dyn VectorIndexStore> {
    match kind {
        IndexKind::Snapshot => Box::new(SnapshotStore::new(root)),
        IndexKind::Journal => Box::new(JournalStore::new(root)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::EmbeddingModelSpec;
    use crate::embeddings::{Embedder, HashedEmbedder};
    use crate::SearchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds like `HashedEmbedder` for `healthy_calls` calls, then fails every call.
    pub(crate) struct FlakyEmbedder {
        inner: HashedEmbedder,
        healthy_calls: usize,
        calls: AtomicUsize,
    }

    impl FlakyEmbedder {
        pub(crate) fn new(model: EmbeddingModelSpec, healthy_calls: usize) -> Self {
            Self {
                inner: HashedEmbedder::new(model),
                healthy_calls,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for FlakyEmbedder {
        fn model(&self) -> &EmbeddingModelSpec {
            self.inner.model()
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy_calls {
                return Err(SearchError::Embedding(
                    "embedding service went away".to_string(),
                ));
            }
            self.inner.embed(texts)
        }
    }
}
