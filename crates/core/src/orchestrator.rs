use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::config::{Catalog, ResolvedSelection, Selection, DEFAULT_STORE_DIR};
use crate::embeddings::{load_embedder, Embedder, EmbeddingBackend};
use crate::ingest::load_documents;
use crate::models::{SearchResult, SkippedFile, UploadedFile};
use crate::store::IndexHandle;
use crate::stores::open_store;
use crate::traits::VectorIndexStore;
use crate::{ConfigError, SearchError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_TOP_K: usize = 3;
pub const MAX_TOP_K: usize = 10;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub store_root: PathBuf,
    pub catalog: Catalog,
    pub chunking: ChunkingConfig,
    pub backend: EmbeddingBackend,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(DEFAULT_STORE_DIR),
            catalog: Catalog::default(),
            chunking: ChunkingConfig::default(),
            backend: EmbeddingBackend::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub document_count: usize,
    pub chunk_count: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub location: PathBuf,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub handle: IndexHandle,
    pub summary: IngestSummary,
}

/// Sequences extraction, chunking, embedding and index persistence. Holds no
/// index itself; handles are passed in and out explicitly.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.chunking.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn resolve(&self, selection: &Selection) -> Result<ResolvedSelection, ConfigError> {
        self.config.catalog.resolve(selection)
    }

    pub fn embedder(&self, selection: &ResolvedSelection) -> Result<Arc<dyn Embedder>, ConfigError> {
        load_embedder(&selection.model, self.config.backend)
    }

    fn store(&self, selection: &ResolvedSelection) -> Box<dyn VectorIndexStore> {
        open_store(selection.kind, self.config.store_root.clone())
    }

    pub async fn ingest(
        &self,
        files: &[UploadedFile],
        selection: &ResolvedSelection,
        embedder: &dyn Embedder,
    ) -> Result<IngestOutcome, SearchError> {
        ensure_same_model(&selection.model.model_id, embedder)?;

        let report = load_documents(files);
        if !report.skipped_files.is_empty() {
            warn!(
                skipped = report.skipped_files.len(),
                total = files.len(),
                "some files were skipped"
            );
        }

        let chunks = chunk_documents(&report.documents, self.config.chunking)?;
        if chunks.is_empty() {
            return Err(SearchError::InvalidArgument(format!(
                "no text could be extracted from {} file(s)",
                files.len()
            )));
        }

        info!(
            documents = report.documents.len(),
            chunks = chunks.len(),
            model = %selection.model.model_id,
            kind = %selection.kind,
            "indexing chunks"
        );

        let handle = self.store(selection).build(&chunks, embedder).await?;
        let summary = IngestSummary {
            document_count: report.documents.len(),
            chunk_count: chunks.len(),
            skipped_files: report.skipped_files,
            location: handle.location().to_path_buf(),
        };

        Ok(IngestOutcome { handle, summary })
    }

    pub async fn open(&self, selection: &ResolvedSelection) -> Result<Option<IndexHandle>, SearchError> {
        self.store(selection).load(&selection.model).await
    }

    pub fn search(
        &self,
        handle: &IndexHandle,
        embedder: &dyn Embedder,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(ConfigError::TopKOutOfRange {
                requested: top_k,
                max: MAX_TOP_K,
            }
            .into());
        }

        if query_text.trim().is_empty() {
            return Err(SearchError::InvalidArgument("query is empty".to_string()));
        }

        ensure_same_model(handle.model_id(), embedder)?;

        let query_vector = embedder.embed_one(query_text)?;
        open_store(handle.kind(), self.config.store_root.clone()).query(handle, &query_vector, top_k)
    }
}

fn ensure_same_model(index_model: &str, embedder: &dyn Embedder) -> Result<(), SearchError> {
    if embedder.model().model_id != index_model {
        return Err(SearchError::ModelMismatch {
            index_model: index_model.to_string(),
            query_model: embedder.model().model_id.clone(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Results(Vec<SearchResult>),
    NoActiveIndex,
}

/// Owns the one active index of an interactive run plus the loaded embedder.
pub struct Session {
    pipeline: Pipeline,
    selection: ResolvedSelection,
    embedder: Arc<dyn Embedder>,
    active: Option<IndexHandle>,
}

impl Session {
    pub fn new(pipeline: Pipeline, selection: &Selection) -> Result<Self, ConfigError> {
        let selection = pipeline.resolve(selection)?;
        let embedder = pipeline.embedder(&selection)?;

        Ok(Self {
            pipeline,
            selection,
            embedder,
            active: None,
        })
    }

    pub fn selection(&self) -> &ResolvedSelection {
        &self.selection
    }

    pub fn active(&self) -> Option<&IndexHandle> {
        self.active.as_ref()
    }

    /// Switches model or index kind. The active index is dropped because it
    /// belongs to the previous selection.
    pub fn select(&mut self, selection: &Selection) -> Result<(), ConfigError> {
        let resolved = self.pipeline.resolve(selection)?;
        if resolved == self.selection {
            return Ok(());
        }

        if resolved.model != self.selection.model {
            self.embedder = self.pipeline.embedder(&resolved)?;
        }
        self.selection = resolved;
        self.active = None;
        Ok(())
    }

    pub async fn ingest(&mut self, files: &[UploadedFile]) -> Result<IngestSummary, SearchError> {
        let outcome = self
            .pipeline
            .ingest(files, &self.selection, self.embedder.as_ref())
            .await?;
        self.active = Some(outcome.handle);
        Ok(outcome.summary)
    }

    pub async fn open_existing(&mut self) -> Result<bool, SearchError> {
        self.active = self.pipeline.open(&self.selection).await?;
        Ok(self.active.is_some())
    }

    pub fn query(&self, query_text: &str, top_k: usize) -> Result<QueryOutcome, SearchError> {
        match &self.active {
            Some(handle) => self
                .pipeline
                .search(handle, self.embedder.as_ref(), query_text, top_k)
                .map(QueryOutcome::Results),
            None => Ok(QueryOutcome::NoActiveIndex),
        }
    }
}
