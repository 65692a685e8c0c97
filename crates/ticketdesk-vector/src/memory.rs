use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use ticketdesk_core::traits::VectorIndexer;
use ticketdesk_core::types::{Chunk, ChunkId, Filters, SearchHit};
use ticketdesk_embed::dot;

use crate::VectorWriter;

type Points = BTreeMap<ChunkId, (Vec<f32>, Chunk)>;

/// Brute-force semantic index held in process memory.
///
/// Vectors are expected to be unit length, so the dot product is the
/// cosine similarity. Ties are broken by ascending id.
#[derive(Default)]
pub struct MemoryVectorIndex {
	points: RwLock<Points>,
}

impl MemoryVectorIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.points.read().map(|p| p.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn read(&self) -> Result<RwLockReadGuard<'_, Points>> {
		self.points.read().map_err(|_| anyhow!("memory vector index lock poisoned"))
	}
}

#[async_trait]
impl VectorWriter for MemoryVectorIndex {
	async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
		if chunks.len() != vectors.len() {
			return Err(anyhow!("{} chunks but {} vectors", chunks.len(), vectors.len()));
		}
		let mut points = self.points.write().map_err(|_| anyhow!("memory vector index lock poisoned"))?;
		for (chunk, vector) in chunks.iter().zip(vectors) {
			points.insert(chunk.id.clone(), (vector.clone(), chunk.clone()));
		}
		debug!(upserted = chunks.len(), total = points.len(), "memory vector upsert");
		Ok(())
	}
}

#[async_trait]
impl VectorIndexer for MemoryVectorIndex {
	async fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> Result<Vec<SearchHit>> {
		if k == 0 {
			return Ok(vec![]);
		}
		let points = self.read()?;
		let mut scored: Vec<(f32, &ChunkId, &Chunk)> = points
			.iter()
			.filter(|(_, (_, chunk))| chunk.matches(filters))
			.map(|(id, (vector, chunk))| (dot(query_vec, vector), id, chunk))
			.collect();
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
		scored.truncate(k);
		Ok(scored
			.into_iter()
			.map(|(score, id, chunk)| SearchHit::vector(id.clone(), score, Some(chunk.clone())))
			.collect())
	}

	async fn fetch_vectors(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, Vec<f32>>> {
		let points = self.read()?;
		Ok(ids.iter().filter_map(|id| points.get(id).map(|(v, _)| (id.clone(), v.clone()))).collect())
	}

	async fn fetch_payloads(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, Chunk>> {
		let points = self.read()?;
		Ok(ids.iter().filter_map(|id| points.get(id).map(|(_, c)| (id.clone(), c.clone()))).collect())
	}
}
