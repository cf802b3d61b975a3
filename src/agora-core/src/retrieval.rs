//! Document store for retrieval-augmented agents.
//!
//! Source documents are loaded and chunked once, embedded, and kept in memory.
//! After [`DocumentStore::build`] returns the store is only ever queried.

use crate::error::AgoraError;
use crate::model::ApiSettings;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

/// Characters per chunk.
pub const CHUNK_SIZE: usize = 1500;
/// Characters shared between neighbouring chunks.
pub const CHUNK_OVERLAP: usize = 150;

/// A slice of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgoraError>;
}

/// Answers a free-text query with up to `k` ranked passages.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, AgoraError>;
}

/// Bag-of-words embedder with hashed buckets, for offline runs.
///
/// Buckets come from the standard library hasher, so vectors are repeatable
/// within one build but may change across Rust releases. Do not persist them.
pub struct HashingEmbedder {
    buckets: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { buckets: 256 }
    }
}

impl HashingEmbedder {
    pub fn new(buckets: usize) -> Self {
        Self {
            buckets: buckets.max(1),
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgoraError> {
        let mut vector = vec![0.0; self.buckets];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.buckets] += 1.0;
        }
        Ok(vector)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder calling the `/embeddings` endpoint of an OpenAI-compatible API.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    settings: ApiSettings,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(settings: ApiSettings, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgoraError> {
        let url = format!("{}/embeddings", self.settings.api_base.trim_end_matches('/'));
        let response: EmbeddingResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AgoraError::RetrievalError("embedding response had no data".into()))
    }
}

/// Split text into overlapping windows of `chunk_size` characters.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let stride = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    chunks
}

/// Read plain-text documents, returning `(source, contents)` pairs.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<(String, String)>, AgoraError> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|e| {
                AgoraError::RetrievalError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Ok((path.display().to_string(), text))
        })
        .collect()
}

/// In-memory cosine-similarity store.
pub struct DocumentStore {
    embedder: Arc<dyn Embedder>,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl DocumentStore {
    /// Chunk and embed every document. This is the only time the store grows.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        documents: Vec<(String, String)>,
    ) -> Result<Self, AgoraError> {
        let mut entries = Vec::new();
        for (source, text) in documents {
            for piece in split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP) {
                let embedding = embedder.embed(&piece).await?;
                entries.push((
                    Chunk {
                        source: source.clone(),
                        text: piece,
                    },
                    embedding,
                ));
            }
        }
        log::info!("document store built with {} chunks", entries.len());
        Ok(Self { embedder, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, AgoraError> {
        let embedding = self.embedder.embed(query).await?;
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, stored)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(stored, &embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[async_trait]
impl Retriever for DocumentStore {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, AgoraError> {
        let hits = self.search(query, k).await?;
        Ok(hits.into_iter().map(|hit| hit.chunk.text).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
