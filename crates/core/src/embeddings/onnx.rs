use super::{normalize, Embedder};
use crate::config::EmbeddingModelSpec;
use crate::error::{ConfigError, SearchError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

fn onnx_model(model_id: &str) -> Option<EmbeddingModel> {
    match model_id {
        "sentence-transformers/all-MiniLM-L6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "BAAI/bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        _ => None,
    }
}

pub(crate) fn supports(model_id: &str) -> bool {
    onnx_model(model_id).is_some()
}

/// Runs a catalogued model through fastembed's ONNX runtime.
pub struct OnnxEmbedder {
    model: EmbeddingModelSpec,
    runtime: Mutex<TextEmbedding>,
}

impl OnnxEmbedder {
    pub fn new(model: EmbeddingModelSpec) -> Result<Self, ConfigError> {
        let onnx_model = onnx_model(&model.model_id).ok_or_else(|| {
            ConfigError::BackendUnavailable(format!("no onnx build of {}", model.model_id))
        })?;

        let runtime = TextEmbedding::try_new(
            InitOptions::new(onnx_model).with_show_download_progress(false),
        )
        .map_err(|error| ConfigError::BackendUnavailable(error.to_string()))?;

        Ok(Self {
            model,
            runtime: Mutex::new(runtime),
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn model(&self) -> &EmbeddingModelSpec {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut runtime = self
            .runtime
            .lock()
            .map_err(|_| SearchError::Embedding("embedding runtime lock poisoned".to_string()))?;
        let mut vectors = runtime
            .embed(texts.to_vec(), None)
            .map_err(|error| SearchError::Embedding(error.to_string()))?;

        for vector in &mut vectors {
            if vector.len() != self.model.dimensions {
                return Err(SearchError::DimensionMismatch {
                    expected: self.model.dimensions,
                    actual: vector.len(),
                });
            }
            normalize(vector);
        }

        Ok(vectors)
    }
}
