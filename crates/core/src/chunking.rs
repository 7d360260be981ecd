use crate::error::ConfigError;
use crate::models::{Chunk, Document};
use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split points in priority order; the empty separator splits between characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

pub fn chunk_documents(
    documents: &[Document],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, ConfigError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        if document.content.trim().is_empty() {
            continue;
        }

        chunks.extend(
            split_text(&document.content, config)
                .into_iter()
                .map(|content| Chunk {
                    content,
                    metadata: document.metadata.clone(),
                }),
        );
    }

    Ok(chunks)
}

/// Splits `text` at the highest-priority separator that keeps pieces within
/// `chunk_size`, then merges neighbouring pieces back up to that size.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    split_recursive(text, &SEPARATORS, config, &mut chunks);
    chunks
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig, out: &mut Vec<String>) {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len());
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut fitting = Vec::new();
    for piece in pieces {
        if char_len(piece) <= config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            merge_pieces(&fitting, config, out);
            fitting.clear();
        }

        if finer.is_empty() {
            push_trimmed(piece, out);
        } else {
            split_recursive(piece, finer, config, out);
        }
    }

    if !fitting.is_empty() {
        merge_pieces(&fitting, config, out);
    }
}

fn merge_pieces(pieces: &[&str], config: ChunkingConfig, out: &mut Vec<String>) {
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            push_trimmed(&join(&window), out);

            // keep at most `chunk_overlap` trailing chars as the head of the next chunk
            while total > config.chunk_overlap || (total > 0 && total + len > config.chunk_size) {
                match window.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }

        window.push_back((piece, len));
        total += len;
    }

    if !window.is_empty() {
        push_trimmed(&join(&window), out);
    }
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
