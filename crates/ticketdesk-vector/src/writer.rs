use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use ticketdesk_core::traits::{Embedder, TextIndexer};
use ticketdesk_core::types::Chunk;

use crate::VectorWriter;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Embed `chunks` in batches and upsert them into `store`.
///
/// `progress` draws a terminal bar; library callers and tests pass `false`.
/// Returns the number of chunks written.
pub async fn index_chunks(
	store: &dyn VectorWriter,
	embedder: &dyn Embedder,
	chunks: &[Chunk],
	batch_size: usize,
	progress: bool,
) -> Result<usize> {
	if chunks.is_empty() {
		info!("no chunks to index");
		return Ok(0);
	}
	let batch_size = batch_size.max(1);
	let pb = if progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
	pb.set_style(
		ProgressStyle::default_bar()
			.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
			.map_err(|e| anyhow!("progress template: {e}"))?
			.progress_chars("#>-"),
	);
	let mut written = 0usize;
	for batch in chunks.chunks(batch_size) {
		let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
		let vectors = embedder.embed_batch(&texts).await.context("embedding chunk batch")?;
		if vectors.len() != batch.len() {
			return Err(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), batch.len()));
		}
		store.upsert(batch, &vectors).await.context("upserting chunk batch")?;
		written += batch.len();
		pb.set_position(written as u64);
		pb.set_message(format!("last id {}", batch[batch.len() - 1].id));
	}
	pb.finish_with_message("indexing completed");
	info!(chunks = written, batch_size, "semantic index populated");
	Ok(written)
}

/// Make one chunk searchable in both indices under the same id.
///
/// The vector point is written first so lexical hits for `chunk.id` can
/// always be backfilled from the semantic index.
pub async fn ingest_chunk(
	text: &dyn TextIndexer,
	store: &dyn VectorWriter,
	embedder: &dyn Embedder,
	chunk: &Chunk,
) -> Result<()> {
	if chunk.id.trim().is_empty() || chunk.text.trim().is_empty() {
		return Err(anyhow!("chunk id and text must be non-empty"));
	}
	let vectors = embedder.embed_batch(&[chunk.text.clone()]).await.context("embedding chunk")?;
	if vectors.len() != 1 {
		return Err(anyhow!("embedder returned {} vectors for 1 chunk", vectors.len()));
	}
	store
		.upsert(std::slice::from_ref(chunk), &vectors)
		.await
		.with_context(|| format!("upserting chunk {}", chunk.id))?;
	text.add(&chunk.id, &chunk.text).with_context(|| format!("indexing chunk {} for keyword search", chunk.id))?;
	debug!(id = %chunk.id, "chunk ingested");
	Ok(())
}
