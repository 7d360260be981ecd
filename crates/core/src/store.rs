use crate::config::{EmbeddingModelSpec, IndexKind};
use crate::error::SearchError;
use crate::models::{Chunk, SearchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Describes what a persisted index directory holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub model_id: String,
    pub model_name: String,
    pub index_kind: IndexKind,
    pub dimensions: usize,
    pub entry_count: usize,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(model: &EmbeddingModelSpec, index_kind: IndexKind, entry_count: usize) -> Self {
        Self {
            model_id: model.model_id.clone(),
            model_name: model.name.clone(),
            index_kind,
            dimensions: model.dimensions,
            entry_count,
            built_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub content: String,
    pub source: String,
    pub vector: Vec<f32>,
}

/// A built or loaded index, ready to be queried.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    manifest: IndexManifest,
    location: PathBuf,
    entries: Vec<IndexEntry>,
}

impl IndexHandle {
    pub(crate) fn new(manifest: IndexManifest, location: PathBuf, entries: Vec<IndexEntry>) -> Self {
        Self {
            manifest,
            location,
            entries,
        }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn model_id(&self) -> &str {
        &self.manifest.model_id
    }

    pub fn kind(&self) -> IndexKind {
        self.manifest.index_kind
    }

    pub fn dimensions(&self) -> usize {
        self.manifest.dimensions
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>, SearchError> {
        if k == 0 {
            return Err(SearchError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        if query_vector.len() != self.manifest.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, inner_product(&entry.vector, query_vector)))
            .collect();

        scored.sort_by(|left, right| {
            right
                .1
                .total_cmp(&left.1)
                .then_with(|| left.0.cmp(&right.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let entry = &self.entries[position];
                SearchResult {
                    chunk_content: entry.content.clone(),
                    source: entry.source.clone(),
                    score,
                }
            })
            .collect())
    }
}

fn inner_product(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

pub(crate) fn make_entries(
    chunks: &[Chunk],
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
    first_index: usize,
) -> Result<Vec<IndexEntry>, SearchError> {
    if chunks.len() != vectors.len() {
        return Err(SearchError::Embedding(format!(
            "embedding count {} doesn't match chunk count {}",
            vectors.len(),
            chunks.len()
        )));
    }

    chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(offset, (chunk, vector))| {
            if vector.len() != dimensions {
                return Err(SearchError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }

            Ok(IndexEntry {
                id: make_entry_id(&chunk.metadata.source, first_index + offset, &chunk.content),
                content: chunk.content.clone(),
                source: chunk.metadata.source.clone(),
                vector,
            })
        })
        .collect()
}

fn make_entry_id(source: &str, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn sibling(location: &Path, suffix: &str) -> PathBuf {
    let mut name = location
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(suffix);
    location.with_file_name(name)
}

/// Where a build writes before it replaces the live index at `location`.
pub(crate) fn staging_location(location: &Path) -> PathBuf {
    sibling(location, ".staging")
}

async fn remove_if_present(path: &Path) -> Result<(), SearchError> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_dir_all(path).await?;
    }
    Ok(())
}

pub(crate) async fn prepare_staging(location: &Path) -> Result<PathBuf, SearchError> {
    let staging = staging_location(location);
    remove_if_present(&staging).await?;
    tokio::fs::create_dir_all(&staging).await?;
    Ok(staging)
}

pub(crate) async fn commit_staging(staging: &Path, location: &Path) -> Result<(), SearchError> {
    let retired = sibling(location, ".retired");
    remove_if_present(&retired).await?;

    if tokio::fs::try_exists(location).await? {
        info!(location = %location.display(), "replacing previous index");
        tokio::fs::rename(location, &retired).await?;
    }
    tokio::fs::rename(staging, location).await?;
    remove_if_present(&retired).await
}

pub(crate) async fn discard_staging(staging: &Path) {
    if let Err(error) = remove_if_present(staging).await {
        warn!(location = %staging.display(), %error, "could not remove staging directory");
    }
}

pub(crate) fn check_manifest(
    manifest: &IndexManifest,
    model: &EmbeddingModelSpec,
    kind: IndexKind,
    location: &Path,
) -> Result<(), SearchError> {
    if manifest.index_kind != kind {
        return Err(SearchError::CorruptIndex {
            location: location.to_path_buf(),
            details: format!("holds a {} index, expected {kind}", manifest.index_kind),
        });
    }

    if manifest.model_id != model.model_id {
        return Err(SearchError::ModelMismatch {
            index_model: manifest.model_id.clone(),
            query_model: model.model_id.clone(),
        });
    }

    if manifest.dimensions != model.dimensions {
        return Err(SearchError::DimensionMismatch {
            expected: model.dimensions,
            actual: manifest.dimensions,
        });
    }

    Ok(())
}

pub(crate) fn check_entries(
    manifest: &IndexManifest,
    entries: &[IndexEntry],
    location: &Path,
) -> Result<(), SearchError> {
    if entries.len() != manifest.entry_count {
        return Err(SearchError::CorruptIndex {
            location: location.to_path_buf(),
            details: format!(
                "manifest lists {} entries but {} were read",
                manifest.entry_count,
                entries.len()
            ),
        });
    }

    if let Some(entry) = entries
        .iter()
        .find(|entry| entry.vector.len() != manifest.dimensions)
    {
        return Err(SearchError::CorruptIndex {
            location: location.to_path_buf(),
            details: format!(
                "entry {} has {} dimensions, expected {}",
                entry.id,
                entry.vector.len(),
                manifest.dimensions
            ),
        });
    }

    Ok(())
}

pub(crate) fn corrupt(location: &Path, details: impl std::fmt::Display) -> SearchError {
    SearchError::CorruptIndex {
        location: location.to_path_buf(),
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn spec() -> EmbeddingModelSpec {
        EmbeddingModelSpec::new("Tiny", "tiny", 2)
    }

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: "doc.txt".to_string(),
            },
        }
    }

    fn handle(vectors: Vec<Vec<f32>>) -> IndexHandle {
        let chunks: Vec<Chunk> = (0..vectors.len())
            .map(|index| chunk(&format!("chunk {index}")))
            .collect();
        let entries = make_entries(&chunks, vectors, 2, 0).expect("entries");
        IndexHandle::new(
            IndexManifest::new(&spec(), IndexKind::Snapshot, entries.len()),
            PathBuf::from("/tmp/unused"),
            entries,
        )
    }

    #[test]
    fn results_are_ranked_by_inner_product() {
        let index = handle(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.6, 0.8]]);
        let results = index.search(&[1.0, 0.0], 2).expect("search");

        let contents: Vec<&str> = results.iter().map(|hit| hit.chunk_content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 1", "chunk 2"]);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].source, "doc.txt");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = handle(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 3).expect("search");

        let contents: Vec<&str> = results.iter().map(|hit| hit.chunk_content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 0", "chunk 2", "chunk 1"]);
    }

    #[test]
    fn empty_index_returns_nothing_for_any_k() {
        let index = handle(Vec::new());
        for k in [1, 5, 100] {
            assert!(index.search(&[1.0, 0.0], k).expect("search").is_empty());
        }
    }

    #[test]
    fn zero_k_and_wrong_dimensions_are_rejected() {
        let index = handle(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            index.search(&[1.0, 0.0], 0),
            Err(SearchError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn entries_reject_mismatched_vectors() {
        let chunks = vec![chunk("a"), chunk("b")];
        assert!(make_entries(&chunks, vec![vec![1.0, 0.0]], 2, 0).is_err());
        assert!(matches!(
            make_entries(&chunks, vec![vec![1.0, 0.0], vec![1.0]], 2, 0),
            Err(SearchError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn commit_replaces_the_live_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("Snapshot_Tiny");
        std::fs::create_dir_all(&location)?;
        std::fs::write(location.join("old.json"), "old")?;

        let staging = prepare_staging(&location).await?;
        assert_eq!(staging, dir.path().join("Snapshot_Tiny.staging"));
        std::fs::write(staging.join("new.json"), "new")?;
        commit_staging(&staging, &location).await?;

        assert!(location.join("new.json").is_file());
        assert!(!location.join("old.json").exists());
        assert!(!staging.exists());
        assert!(!dir.path().join("Snapshot_Tiny.retired").exists());
        Ok(())
    }

    #[tokio::test]
    async fn discarded_staging_leaves_live_directory_alone() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("Journal_Tiny");
        std::fs::create_dir_all(&location)?;
        std::fs::write(location.join("manifest.json"), "{}")?;

        let staging = prepare_staging(&location).await?;
        discard_staging(&staging).await;

        assert!(!staging.exists());
        assert!(location.join("manifest.json").is_file());
        Ok(())
    }

    #[test]
    fn manifest_for_another_model_is_rejected() {
        let manifest = IndexManifest::new(&spec(), IndexKind::Journal, 0);
        let other = EmbeddingModelSpec::new("Other", "other", 2);
        let location = Path::new("/tmp/unused");

        assert!(check_manifest(&manifest, &spec(), IndexKind::Journal, location).is_ok());
        assert!(matches!(
            check_manifest(&manifest, &other, IndexKind::Journal, location),
            Err(SearchError::ModelMismatch { .. })
        ));
        assert!(matches!(
            check_manifest(&manifest, &spec(), IndexKind::Snapshot, location),
            Err(SearchError::CorruptIndex { .. })
        ));
    }
}
