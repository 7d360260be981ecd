pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{
    chunk_documents, split_text, ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
pub use config::{
    index_location, sanitize_model_name, Catalog, EmbeddingModelSpec, IndexKind,
    ResolvedSelection, Selection, DEFAULT_STORE_DIR,
};
pub use embeddings::{load_embedder, Embedder, EmbeddingBackend, HashedEmbedder};
pub use error::{ConfigError, IngestError, SearchError};
pub use extractor::{clean_text, extract_text, FileKind, LopdfExtractor, PlainTextExtractor, TextExtractor};
pub use ingest::{discover_files, load_documents, read_files};
pub use models::{
    Chunk, Document, DocumentMetadata, IngestionReport, SearchResult, SkippedFile, UploadedFile,
};
pub use orchestrator::{
    IngestOutcome, IngestSummary, Pipeline, PipelineConfig, QueryOutcome, Session, DEFAULT_TOP_K,
    MAX_TOP_K,
};
pub use store::{IndexEntry, IndexHandle, IndexManifest};
pub use stores::{open_store, JournalStore, SnapshotStore};
pub use traits::VectorIndexStore;
