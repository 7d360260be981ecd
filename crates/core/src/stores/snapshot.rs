use crate::config::{EmbeddingModelSpec, IndexKind};
use crate::embeddings::Embedder;
use crate::models::Chunk;
use crate::store::{
    check_entries, check_manifest, commit_staging, corrupt, discard_staging, make_entries,
    prepare_staging, IndexEntry, IndexHandle, IndexManifest,
};
use crate::traits::VectorIndexStore;
use crate::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

/// Builds the whole index in memory, then saves it as one file.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl VectorIndexStore for SnapshotStore {
    fn kind(&self) -> IndexKind {
        IndexKind::Snapshot
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn build(
        &self,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Result<IndexHandle, SearchError> {
        let location = self.location(embedder.model());
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();

        debug!(chunk_count = texts.len(), "embedding chunks for snapshot");
        let vectors = embedder.embed(&texts)?;
        let entries = make_entries(chunks, vectors, embedder.dimensions(), 0)?;

        let snapshot = SnapshotFile {
            manifest: IndexManifest::new(embedder.model(), IndexKind::Snapshot, entries.len()),
            entries,
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let staging = prepare_staging(&location).await?;
        if let Err(error) = tokio::fs::write(staging.join(SNAPSHOT_FILE), &bytes).await {
            warn!(location = %location.display(), %error, "snapshot write failed, previous index kept");
            discard_staging(&staging).await;
            return Err(error.into());
        }
        commit_staging(&staging, &location).await?;

        info!(
            location = %location.display(),
            entry_count = snapshot.entries.len(),
            "snapshot index saved"
        );

        Ok(IndexHandle::new(snapshot.manifest, location, snapshot.entries))
    }

    async fn load(&self, model: &EmbeddingModelSpec) -> Result<Option<IndexHandle>, SearchError> {
        let location = self.location(model);
        if !tokio::fs::try_exists(&location).await? {
            return Ok(None);
        }

        let bytes = match tokio::fs::read(location.join(SNAPSHOT_FILE)).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(corrupt(&location, format!("{SNAPSHOT_FILE} is missing")));
            }
            Err(error) => return Err(error.into()),
        };

        let snapshot: SnapshotFile =
            serde_json::from_slice(&bytes).map_err(|error| corrupt(&location, error))?;
        check_manifest(&snapshot.manifest, model, IndexKind::Snapshot, &location)?;
        check_entries(&snapshot.manifest, &snapshot.entries, &location)?;

        info!(
            location = %location.display(),
            entry_count = snapshot.entries.len(),
            "snapshot index loaded"
        );

        Ok(Some(IndexHandle::new(
            snapshot.manifest,
            location,
            snapshot.entries,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedEmbedder;
    use crate::models::DocumentMetadata;
    use tempfile::tempdir;

    fn chunk(content: &str, source: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: source.to_string(),
            },
        }
    }

    fn embedder() -> HashedEmbedder {
        HashedEmbedder::new(EmbeddingModelSpec::new("Test Model (Small)", "test/small", 64))
    }

    #[tokio::test]
    async fn load_before_build_is_empty_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        assert!(store.load(embedder().model()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn build_then_load_answers_identically() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        let embedder = embedder();
        let chunks = vec![
            chunk("pumps move fluid through pipes", "a.txt"),
            chunk("valves regulate the flow of fluid", "a.txt"),
            chunk("poems about the sea and the sky", "b.txt"),
        ];

        let built = store.build(&chunks, &embedder).await?;
        assert_eq!(
            built.location(),
            dir.path().join("Snapshot_Test_Model_Small")
        );
        assert!(built.location().join(SNAPSHOT_FILE).is_file());

        let loaded = store
            .load(embedder.model())
            .await?
            .ok_or("index should exist after build")?;

        let query = embedder.embed_one("fluid flow in pipes")?;
        let fresh = store.query(&built, &query, 3)?;
        let restored = store.query(&loaded, &query, 3)?;

        assert_eq!(fresh.len(), 3);
        assert_eq!(fresh.len(), restored.len());
        for (left, right) in fresh.iter().zip(&restored) {
            assert_eq!(left.chunk_content, right.chunk_content);
            assert_eq!(left.source, right.source);
            assert!((left.score - right.score).abs() < 1e-6);
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_snapshot_file_is_corruption() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        let embedder = embedder();
        std::fs::create_dir_all(store.location(embedder.model()))?;

        let result = store.load(embedder.model()).await;
        assert!(matches!(result, Err(SearchError::CorruptIndex { .. })));
        Ok(())
    }
}
