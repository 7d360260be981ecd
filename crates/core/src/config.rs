use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_DIR: &str = "vector_store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelSpec {
    pub name: String,
    pub model_id: String,
    pub dimensions: usize,
}

impl EmbeddingModelSpec {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            dimensions,
        }
    }

    pub fn sanitized_name(&self) -> String {
        sanitize_model_name(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Whole index serialized as one self-contained snapshot file.
    Snapshot,
    /// Manifest plus an append-only record log written while building.
    Journal,
}

impl IndexKind {
    pub const ALL: [IndexKind; 2] = [IndexKind::Snapshot, IndexKind::Journal];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Snapshot => "Snapshot",
            Self::Journal => "Journal",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Journal => "journal",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Closed set of embedding models and index kinds a caller may select from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    models: Vec<EmbeddingModelSpec>,
    index_kinds: Vec<IndexKind>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            models: vec![
                EmbeddingModelSpec::new(
                    "All-MiniLM-L6-v2 (Fast & Light)",
                    "sentence-transformers/all-MiniLM-L6-v2",
                    384,
                ),
                EmbeddingModelSpec::new(
                    "BGE-Small-EN (High Performance)",
                    "BAAI/bge-small-en-v1.5",
                    384,
                ),
                EmbeddingModelSpec::new("BERT-Base-Uncased", "bert-base-uncased", 768),
            ],
            index_kinds: IndexKind::ALL.to_vec(),
        }
    }
}

impl Catalog {
    pub fn new(models: Vec<EmbeddingModelSpec>, index_kinds: Vec<IndexKind>) -> Self {
        Self {
            models,
            index_kinds,
        }
    }

    pub fn models(&self) -> &[EmbeddingModelSpec] {
        &self.models
    }

    pub fn index_kinds(&self) -> &[IndexKind] {
        &self.index_kinds
    }

    pub fn resolve_model(&self, selection: &str) -> Result<&EmbeddingModelSpec, ConfigError> {
        let selection = selection.trim();
        self.models
            .iter()
            .find(|model| model.name == selection || model.model_id == selection)
            .ok_or_else(|| ConfigError::UnknownModel(selection.to_string()))
    }

    pub fn resolve_index_kind(&self, selection: &str) -> Result<IndexKind, ConfigError> {
        let selection = selection.trim();
        self.index_kinds
            .iter()
            .copied()
            .find(|kind| {
                kind.display_name().eq_ignore_ascii_case(selection) || kind.key() == selection
            })
            .ok_or_else(|| ConfigError::UnknownIndexKind(selection.to_string()))
    }

    pub fn resolve(&self, selection: &Selection) -> Result<ResolvedSelection, ConfigError> {
        Ok(ResolvedSelection {
            model: self.resolve_model(&selection.model)?.clone(),
            kind: self.resolve_index_kind(&selection.index_kind)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub model: String,
    pub index_kind: String,
}

impl Selection {
    pub fn new(model: impl Into<String>, index_kind: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            index_kind: index_kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub model: EmbeddingModelSpec,
    pub kind: IndexKind,
}

pub fn sanitize_model_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '(' | ')'))
        .map(|ch| if ch == ' ' { '_' } else { ch })
        .collect()
}

pub fn index_location(root: &Path, kind: IndexKind, model: &EmbeddingModelSpec) -> PathBuf {
    root.join(format!("{}_{}", kind.display_name(), model.sanitized_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_are_sanitized_for_directories() {
        assert_eq!(
            sanitize_model_name("All-MiniLM-L6-v2 (Fast & Light)"),
            "All-MiniLM-L6-v2_Fast_&_Light"
        );
        assert_eq!(sanitize_model_name("BERT-Base-Uncased"), "BERT-Base-Uncased");
    }

    #[test]
    fn index_location_is_keyed_by_kind_and_model() {
        let catalog = Catalog::default();
        let model = catalog
            .resolve_model("BGE-Small-EN (High Performance)")
            .expect("model is catalogued");

        let snapshot = index_location(Path::new("/data"), IndexKind::Snapshot, model);
        let journal = index_location(Path::new("/data"), IndexKind::Journal, model);

        assert_eq!(
            snapshot,
            PathBuf::from("/data/Snapshot_BGE-Small-EN_High_Performance")
        );
        assert_ne!(snapshot, journal);
    }

    #[test]
    fn selections_resolve_by_name_or_identifier() {
        let catalog = Catalog::default();
        let by_name = catalog
            .resolve(&Selection::new("BERT-Base-Uncased", "Journal"))
            .expect("known selection");
        let by_id = catalog
            .resolve(&Selection::new("bert-base-uncased", "journal"))
            .expect("known selection");

        assert_eq!(by_name, by_id);
        assert_eq!(by_name.model.dimensions, 768);
        assert_eq!(by_name.kind, IndexKind::Journal);
    }

    #[test]
    fn unknown_selections_are_configuration_errors() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.resolve_model("gpt-embeddings"),
            Err(ConfigError::UnknownModel("gpt-embeddings".to_string()))
        );
        assert_eq!(
            catalog.resolve_index_kind("hnsw"),
            Err(ConfigError::UnknownIndexKind("hnsw".to_string()))
        );

        let restricted = Catalog::new(catalog.models().to_vec(), vec![IndexKind::Snapshot]);
        assert!(restricted.resolve_index_kind("Journal").is_err());
    }
}
