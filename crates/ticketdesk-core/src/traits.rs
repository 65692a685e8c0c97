use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, Chunk, ChunkId, Filters, FusedHit, SearchHit};

/// Produces unit-normalised vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Keyword ranking over the in-process corpus.
pub trait TextIndexer: Send + Sync {
    /// Index one document, replacing any document with the same id.
    fn add(&self, id: &str, text: &str) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

impl<T: TextIndexer + ?Sized> TextIndexer for Arc<T> {
    fn add(&self, id: &str, text: &str) -> anyhow::Result<()> {
        (**self).add(id, text)
    }
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        (**self).search(query, k)
    }
}

/// Similarity search against an external vector store.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    /// Ranked hits matching `filters`, each carrying its payload.
    async fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> anyhow::Result<Vec<SearchHit>>;
    /// Stored vectors by id; ids that are not stored are absent from the map.
    async fn fetch_vectors(&self, ids: &[ChunkId]) -> anyhow::Result<HashMap<ChunkId, Vec<f32>>>;
    /// Stored payloads by id; ids that are not stored are absent from the map.
    async fn fetch_payloads(&self, ids: &[ChunkId]) -> anyhow::Result<HashMap<ChunkId, Chunk>>;
}

#[async_trait]
impl<T: VectorIndexer + ?Sized> VectorIndexer for Arc<T> {
    async fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> anyhow::Result<Vec<SearchHit>> {
        (**self).search_vec(query_vec, k, filters).await
    }
    async fn fetch_vectors(&self, ids: &[ChunkId]) -> anyhow::Result<HashMap<ChunkId, Vec<f32>>> {
        (**self).fetch_vectors(ids).await
    }
    async fn fetch_payloads(&self, ids: &[ChunkId]) -> anyhow::Result<HashMap<ChunkId, Chunk>> {
        (**self).fetch_payloads(ids).await
    }
}

/// Text generation returning (ideally) a single JSON object.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for Arc<T> {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        (**self).complete(messages).await
    }
}

/// Hybrid retrieval as seen by the orchestrator.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search_merged(&self, query: &str, top_k: usize, filters: &Filters, alpha: f32) -> Result<Vec<FusedHit>>;
}

#[async_trait]
impl<T: SearchEngine + ?Sized> SearchEngine for Arc<T> {
    async fn search_merged(&self, query: &str, top_k: usize, filters: &Filters, alpha: f32) -> Result<Vec<FusedHit>> {
        (**self).search_merged(query, top_k, filters, alpha).await
    }
}
