use crate::config::EmbeddingModelSpec;
use crate::error::{ConfigError, SearchError};
use std::sync::Arc;

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

const FNV_OFFSET: u64 = 1469598103934665603;
const FNV_PRIME: u64 = 1099511628211;

/// Text to unit-length vector function for one catalogued model.
pub trait Embedder: Send + Sync {
    fn model(&self) -> &EmbeddingModelSpec;

    fn dimensions(&self) -> usize {
        self.model().dimensions
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("model returned no vector".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    #[default]
    Hashed,
    #[cfg(feature = "onnx")]
    Onnx,
}

impl EmbeddingBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Hashed => "hashed",
            #[cfg(feature = "onnx")]
            Self::Onnx => "onnx",
        }
    }

    pub fn supports(self, model: &EmbeddingModelSpec) -> bool {
        match self {
            Self::Hashed => model.dimensions > 0,
            #[cfg(feature = "onnx")]
            Self::Onnx => onnx::supports(&model.model_id),
        }
    }
}

pub fn load_embedder(
    model: &EmbeddingModelSpec,
    backend: EmbeddingBackend,
) -> Result<Arc<dyn Embedder>, ConfigError> {
    if model.dimensions == 0 {
        return Err(ConfigError::UnknownModel(format!(
            "{} declares zero dimensions",
            model.name
        )));
    }

    tracing::info!(model = %model.model_id, ?backend, "loading embedding model");
    match backend {
        EmbeddingBackend::Hashed => Ok(Arc::new(HashedEmbedder::new(model.clone()))),
        #[cfg(feature = "onnx")]
        EmbeddingBackend::Onnx => Ok(Arc::new(OnnxEmbedder::new(model.clone())?)),
    }
}

/// Hashes lowercase character trigrams and whole words into buckets, seeded
/// by the model id so every catalogued model gets its own vector space.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    model: EmbeddingModelSpec,
    seed: u64,
}

impl HashedEmbedder {
    pub fn new(model: EmbeddingModelSpec) -> Self {
        let seed = fnv1a(FNV_OFFSET, model.model_id.as_bytes());
        Self { model, seed }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.model.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            self.bump(&mut vector, token.as_bytes(), 1.0);
        }

        for word in lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            self.bump(&mut vector, word.as_bytes(), 2.0);
        }

        normalize(&mut vector);
        vector
    }

    fn bump(&self, vector: &mut [f32], token: &[u8], weight: f32) {
        let bucket = (fnv1a(self.seed, token) % vector.len() as u64) as usize;
        vector[bucket] += weight;
    }
}

impl Embedder for HashedEmbedder {
    fn model(&self) -> &EmbeddingModelSpec {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}
