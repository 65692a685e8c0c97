//! ticketdesk-vector
//!
//! Semantic index adapters implementing
//! [`ticketdesk_core::traits::VectorIndexer`]: an in-process brute-force
//! index and a Qdrant REST client. Both accept writes through
//! [`VectorWriter`]; [`writer::index_chunks`] embeds and loads a corpus and
//! [`writer::ingest_chunk`] adds a single chunk to both indices.

use anyhow::Result;
use async_trait::async_trait;

use ticketdesk_core::types::Chunk;

pub mod memory;
pub mod qdrant;
pub mod writer;

pub use memory::MemoryVectorIndex;
pub use qdrant::QdrantIndex;
pub use writer::{index_chunks, ingest_chunk};

/// Write side of a semantic index. `vectors[i]` belongs to `chunks[i]`;
/// an existing point with the same chunk id is replaced.
#[async_trait]
pub trait VectorWriter: Send + Sync {
	async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;
}
