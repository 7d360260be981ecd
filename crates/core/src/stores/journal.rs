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
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.jsonl";
const DEFAULT_BATCH_SIZE: usize = 64;

/// Keeps a manifest next to an append-only JSON-lines log of entries. Entries
/// hit a staging directory batch by batch while the build is still embedding;
/// the manifest is written last and the directory only replaces the live
/// index once both are complete.
pub struct JournalStore {
    root: PathBuf,
    batch_size: usize,
}

impl JournalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Appends every batch to the log in `dir`, then writes the manifest with
    /// the final count. Nothing in `dir` is a loadable index until that last write.
    async fn write_journal(
        &self,
        dir: &Path,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Result<(IndexManifest, Vec<IndexEntry>), SearchError> {
        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(ENTRIES_FILE))
            .await?;

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let vectors = embedder.embed(&texts)?;
            let batch_entries = make_entries(batch, vectors, embedder.dimensions(), entries.len())?;

            let mut lines = Vec::new();
            for entry in &batch_entries {
                serde_json::to_writer(&mut lines, entry)?;
                lines.push(b'\n');
            }
            log.write_all(&lines).await?;
            log.flush().await?;

            entries.extend(batch_entries);
            debug!(written = entries.len(), total = chunks.len(), "journal batch appended");
        }
        log.sync_all().await?;

        let manifest = IndexManifest::new(embedder.model(), IndexKind::Journal, entries.len());
        tokio::fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?).await?;
        Ok((manifest, entries))
    }
}

#[async_trait]
impl VectorIndexStore for JournalStore {
    fn kind(&self) -> IndexKind {
        IndexKind::Journal
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
        let staging = prepare_staging(&location).await?;

        let (manifest, entries) = match self.write_journal(&staging, chunks, embedder).await {
            Ok(written) => written,
            Err(error) => {
                warn!(location = %location.display(), %error, "journal build failed, previous index kept");
                discard_staging(&staging).await;
                return Err(error);
            }
        };
        commit_staging(&staging, &location).await?;

        info!(
            location = %location.display(),
            entry_count = entries.len(),
            "journal index committed"
        );

        Ok(IndexHandle::new(manifest, location, entries))
    }

    async fn load(&self, model: &EmbeddingModelSpec) -> Result<Option<IndexHandle>, SearchError> {
        let location = self.location(model);
        if !tokio::fs::try_exists(&location).await? {
            return Ok(None);
        }

        let manifest_bytes = match tokio::fs::read(location.join(MANIFEST_FILE)).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(corrupt(&location, format!("{MANIFEST_FILE} is missing")));
            }
            Err(error) => return Err(error.into()),
        };
        let manifest: IndexManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|error| corrupt(&location, error))?;
        check_manifest(&manifest, model, IndexKind::Journal, &location)?;

        let log = match tokio::fs::read_to_string(location.join(ENTRIES_FILE)).await {
            Ok(log) => log,
            Err(error) if error.kind() == ErrorKind::NotFound => String::new(),
            Err(error) => return Err(error.into()),
        };

        let entries = log
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(line_no, line)| {
                serde_json::from_str::<IndexEntry>(line).map_err(|error| {
                    corrupt(&location, format!("{ENTRIES_FILE} line {}: {error}", line_no + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_entries(&manifest, &entries, &location)?;

        info!(
            location = %location.display(),
            entry_count = entries.len(),
            "journal index loaded"
        );

        Ok(Some(IndexHandle::new(manifest, location, entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedEmbedder;
    use crate::models::DocumentMetadata;
    use crate::store::staging_location;
    use crate::stores::testing::FlakyEmbedder;
    use tempfile::tempdir;

    fn chunks(prefix: &str, count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|index| Chunk {
                content: format!("{prefix} passage number {index}"),
                metadata: DocumentMetadata {
                    source: format!("{prefix}.txt"),
                },
            })
            .collect()
    }

    fn embedder() -> HashedEmbedder {
        HashedEmbedder::new(EmbeddingModelSpec::new("Journal Test", "test/journal", 32))
    }

    #[tokio::test]
    async fn entries_are_appended_in_batches() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JournalStore::new(dir.path()).with_batch_size(2);
        let embedder = embedder();

        let built = store.build(&chunks("turbine", 5), &embedder).await?;
        assert_eq!(built.len(), 5);

        let log = std::fs::read_to_string(built.location().join(ENTRIES_FILE))?;
        assert_eq!(log.lines().count(), 5);

        let manifest: IndexManifest =
            serde_json::from_slice(&std::fs::read(built.location().join(MANIFEST_FILE))?)?;
        assert_eq!(manifest.entry_count, 5);
        assert_eq!(manifest.index_kind, IndexKind::Journal);
        Ok(())
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_entries() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JournalStore::new(dir.path());
        let embedder = embedder();

        store.build(&chunks("turbine", 4), &embedder).await?;
        store.build(&chunks("compressor", 2), &embedder).await?;

        let loaded = store
            .load(embedder.model())
            .await?
            .ok_or("index should exist")?;
        assert_eq!(loaded.len(), 2);

        let query = embedder.embed_one("turbine passage number 1")?;
        let results = store.query(&loaded, &query, 10)?;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|hit| hit.source == "compressor.txt"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_build_yields_empty_results() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JournalStore::new(dir.path());
        let embedder = embedder();

        store.build(&[], &embedder).await?;
        let loaded = store
            .load(embedder.model())
            .await?
            .ok_or("empty index is still an index")?;

        let query = embedder.embed_one("anything")?;
        for k in [1, 3, 10] {
            assert!(store.query(&loaded, &query, k)?.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn uncommitted_entries_are_reported_as_corrupt() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let store = JournalStore::new(dir.path());
        let embedder = embedder();
        let built = store.build(&chunks("pump", 2), &embedder).await?;

        let mut manifest = built.manifest().clone();
        manifest.entry_count = 0;
        std::fs::write(
            built.location().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest)?,
        )?;

        let result = store.load(embedder.model()).await;
        assert!(matches!(result, Err(SearchError::CorruptIndex { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn failure_after_a_written_batch_keeps_previous_index(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = JournalStore::new(dir.path()).with_batch_size(2);
        let embedder = embedder();
        let built = store.build(&chunks("turbine", 4), &embedder).await?;

        let flaky = FlakyEmbedder::new(embedder.model().clone(), 1);
        let result = store.build(&chunks("compressor", 5), &flaky).await;
        assert!(matches!(result, Err(SearchError::Embedding(_))));

        let loaded = store
            .load(embedder.model())
            .await?
            .ok_or("previous index should survive")?;
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.manifest().entry_count, 4);

        let query = embedder.embed_one("compressor passage number 0")?;
        let results = store.query(&loaded, &query, 10)?;
        assert!(results.iter().all(|hit| hit.source == "turbine.txt"));
        assert!(!staging_location(built.location()).exists());
        Ok(())
    }

    #[tokio::test]
    async fn handles_from_another_kind_are_refused() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let journal = JournalStore::new(dir.path());
        let snapshot = crate::stores::SnapshotStore::new(dir.path());
        let embedder = embedder();

        let handle = snapshot.build(&chunks("pump", 1), &embedder).await?;
        let query = embedder.embed_one("pump")?;
        assert!(matches!(
            journal.query(&handle, &query, 1),
            Err(SearchError::InvalidArgument(_))
        ));
        Ok(())
    }
}
