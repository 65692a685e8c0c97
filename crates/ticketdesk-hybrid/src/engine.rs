use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, instrument};

use ticketdesk_core::error::{Error, Result};
use ticketdesk_core::traits::{Embedder, SearchEngine, TextIndexer, VectorIndexer};
use ticketdesk_core::types::{ChunkId, Filters, FusedHit};
use ticketdesk_embed::dot;

use crate::fusion::{fuse, lexical_only, union, Candidate};

pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 4;

/// Hybrid retrieval over a lexical index and a semantic index.
///
/// Each engine is asked for `top_k * candidate_multiplier` candidates; see
/// [`HybridSearchEngine::search_merged`] for the fusion steps.
pub struct HybridSearchEngine<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    text: TI,
    vector: VI,
    embedder: Box<dyn Embedder>,
    candidate_multiplier: usize,
}

impl<TI, VI> HybridSearchEngine<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    pub fn new(text: TI, vector: VI, embedder: Box<dyn Embedder>) -> Self {
        Self { text, vector, embedder, candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER }
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    /// Fuse semantic and lexical rankings for `query`.
    ///
    /// 1. embed the query once
    /// 2. fetch semantic (filtered, with payload) and lexical candidates concurrently
    /// 3. union by id
    /// 4. backfill semantic scores of lexical-only ids from their stored vectors
    /// 5. min-max normalise each column, merge with `alpha`
    /// 6. order by merged score then id, truncate to `top_k`
    /// 7. fetch payloads for surviving hits that have none
    ///
    /// Any adapter failure is returned as [`Error::RetrievalUnavailable`].
    #[instrument(skip(self, filters), fields(filters = filters.len()))]
    pub async fn search_merged(&self, query: &str, top_k: usize, filters: &Filters, alpha: f32) -> Result<Vec<FusedHit>> {
        if top_k == 0 {
            return Err(Error::InvalidRequest("top_k must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidRequest(format!("alpha must be within [0, 1], got {alpha}")));
        }
        let candidates_k = top_k.saturating_mul(self.candidate_multiplier);

        let q_vec = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await
            .and_then(|mut v| if v.is_empty() { Err(anyhow!("embedder returned no vector")) } else { Ok(v.remove(0)) })
            .map_err(|e| Error::retrieval("embedding", &e))?;

        let semantic = async {
            self.vector
                .search_vec(&q_vec, candidates_k, filters)
                .await
                .map_err(|e| Error::retrieval("semantic", &e))
        };
        let lexical = async { self.text.search(query, candidates_k).map_err(|e| Error::retrieval("lexical", &e)) };
        let (sem_hits, lex_hits) = futures::try_join!(semantic, lexical)?;
        debug!(semantic = sem_hits.len(), lexical = lex_hits.len(), "candidates fetched");

        let mut candidates = union(sem_hits, lex_hits);
        self.backfill_semantic(&q_vec, &mut candidates).await?;

        let mut fused = fuse(candidates, alpha);
        fused.truncate(top_k);
        self.backfill_payloads(&mut fused).await?;
        debug!(returned = fused.len(), "fusion complete");
        Ok(fused)
    }

    async fn backfill_semantic(&self, q_vec: &[f32], candidates: &mut BTreeMap<ChunkId, Candidate>) -> Result<()> {
        let missing = lexical_only(candidates);
        if missing.is_empty() {
            return Ok(());
        }
        let vectors = self
            .vector
            .fetch_vectors(&missing)
            .await
            .map_err(|e| Error::retrieval("semantic", &e))?;
        for id in &missing {
            if let Some(c) = candidates.get_mut(id) {
                c.semantic = Some(vectors.get(id).map_or(0.0, |v| dot(q_vec, v)));
            }
        }
        debug!(backfilled = missing.len(), found = vectors.len(), "semantic backfill");
        Ok(())
    }

    async fn backfill_payloads(&self, hits: &mut [FusedHit]) -> Result<()> {
        let missing: Vec<ChunkId> = hits.iter().filter(|h| h.payload.is_none()).map(|h| h.id.clone()).collect();
        if missing.is_empty() {
            return Ok(());
        }
        let mut payloads = self
            .vector
            .fetch_payloads(&missing)
            .await
            .map_err(|e| Error::retrieval("semantic", &e))?;
        for hit in hits.iter_mut().filter(|h| h.payload.is_none()) {
            hit.payload = payloads.remove(&hit.id);
        }
        Ok(())
    }
}

#[async_trait]
impl<TI, VI> SearchEngine for HybridSearchEngine<TI, VI>
where
    TI: TextIndexer,
    VI: VectorIndexer,
{
    async fn search_merged(&self, query: &str, top_k: usize, filters: &Filters, alpha: f32) -> Result<Vec<FusedHit>> {
        Self::search_merged(self, query, top_k, filters, alpha).await
    }
}
