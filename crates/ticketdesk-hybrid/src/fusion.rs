//! Pure score fusion: candidate union, min-max normalisation, weighted merge
//! and the final ordering. No I/O happens here.

use std::collections::BTreeMap;

use ticketdesk_core::types::{Chunk, ChunkId, FusedHit, SearchHit};

/// One unique id seen by either engine during a single fusion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub semantic: Option<f32>,
    pub lexical: Option<f32>,
    pub payload: Option<Chunk>,
}

/// Union semantic and lexical hits by id. Ordered by id, so everything built
/// from the union is deterministic.
pub fn union(semantic: Vec<SearchHit>, lexical: Vec<SearchHit>) -> BTreeMap<ChunkId, Candidate> {
    let mut by_id: BTreeMap<ChunkId, Candidate> = BTreeMap::new();
    for hit in semantic {
        let c = by_id.entry(hit.id).or_default();
        if c.semantic.map_or(true, |s| hit.score > s) {
            c.semantic = Some(hit.score);
        }
        if c.payload.is_none() {
            c.payload = hit.payload;
        }
    }
    for hit in lexical {
        let c = by_id.entry(hit.id).or_default();
        if c.lexical.map_or(true, |s| hit.score > s) {
            c.lexical = Some(hit.score);
        }
    }
    by_id
}

/// Ids that only the lexical engine produced; they need a backfilled
/// semantic score.
pub fn lexical_only(candidates: &BTreeMap<ChunkId, Candidate>) -> Vec<ChunkId> {
    candidates
        .iter()
        .filter(|(_, c)| c.semantic.is_none())
        .map(|(id, _)| id.clone())
        .collect()
}

/// Min-max normalise into `[0, 1]`. A column whose values are all equal,
/// including a single value, maps to `1.0`. Non-finite inputs count as `0.0`.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let clean: Vec<f32> = values.iter().map(|v| if v.is_finite() { *v } else { 0.0 }).collect();
    let (min, max) = clean
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        return vec![1.0; clean.len()];
    }
    clean.iter().map(|v| ((v - min) / span).clamp(0.0, 1.0)).collect()
}

/// Normalise both columns across the whole union, merge with `alpha` and
/// order by merged score descending then id ascending. Missing scores enter
/// normalisation as `0.0`.
pub fn fuse(candidates: BTreeMap<ChunkId, Candidate>, alpha: f32) -> Vec<FusedHit> {
    let sem_raw: Vec<f32> = candidates.values().map(|c| c.semantic.unwrap_or(0.0)).collect();
    let lex_raw: Vec<f32> = candidates.values().map(|c| c.lexical.unwrap_or(0.0)).collect();
    let sem_norm = min_max_normalize(&sem_raw);
    let lex_norm = min_max_normalize(&lex_raw);

    let mut fused: Vec<FusedHit> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, (id, c))| {
            let merged = alpha * sem_norm[i] + (1.0 - alpha) * lex_norm[i];
            FusedHit {
                id,
                merged_score: if merged.is_finite() { merged.clamp(0.0, 1.0) } else { 0.0 },
                semantic: sem_raw[i],
                lexical: lex_raw[i],
                payload: c.payload,
            }
        })
        .collect();
    sort_fused(&mut fused);
    fused
}

pub fn sort_fused(hits: &mut [FusedHit]) {
    hits.sort_by(|a, b| b.merged_score.total_cmp(&a.merged_score).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sem(id: &str, score: f32) -> SearchHit {
        SearchHit::vector(id, score, None)
    }

    fn lex(id: &str, score: f32) -> SearchHit {
        SearchHit::text(id, score)
    }

    #[test]
    fn uniform_column_normalises_to_one() {
        assert_eq!(min_max_normalize(&[0.4, 0.4, 0.4]), vec![1.0, 1.0, 1.0]);
        assert_eq!(min_max_normalize(&[7.0]), vec![1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn normalisation_spans_zero_to_one() {
        assert_eq!(min_max_normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn union_merges_both_engines_by_id() {
        let u = union(vec![sem("a", 0.9), sem("b", 0.5)], vec![lex("b", 3.0), lex("c", 1.0)]);
        assert_eq!(u.keys().cloned().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(u["b"].semantic, Some(0.5));
        assert_eq!(u["b"].lexical, Some(3.0));
        assert_eq!(lexical_only(&u), vec!["c".to_string()]);
    }

    #[test]
    fn single_candidate_scores_one() {
        let fused = fuse(union(vec![sem("only", 0.2)], vec![lex("only", 0.1)]), 0.7);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].merged_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equal_merged_scores_order_by_id() {
        let fused = fuse(union(vec![sem("b", 0.5), sem("a", 0.5)], vec![]), 0.5);
        assert_eq!(fused.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn alpha_extremes_follow_one_signal() {
        let cands = || union(vec![sem("a", 0.9), sem("b", 0.1)], vec![lex("a", 1.0), lex("b", 5.0)]);
        assert_eq!(fuse(cands(), 1.0)[0].id, "a");
        assert_eq!(fuse(cands(), 0.0)[0].id, "b");
    }

    proptest! {
        #[test]
        fn merged_scores_stay_in_unit_range(
            sem_scores in proptest::collection::vec(-1.0f32..1.0, 0..20),
            lex_scores in proptest::collection::vec(0.0f32..50.0, 0..20),
            alpha in 0.0f32..=1.0,
        ) {
            let semantic = sem_scores.iter().enumerate().map(|(i, s)| sem(&format!("s{i}"), *s)).collect();
            let lexical = lex_scores.iter().enumerate().map(|(i, s)| lex(&format!("l{}", i % 7), *s)).collect();
            let fused = fuse(union(semantic, lexical), alpha);
            for h in &fused {
                prop_assert!((0.0..=1.0).contains(&h.merged_score));
            }
            for pair in fused.windows(2) {
                prop_assert!(pair[0].merged_score > pair[1].merged_score
                    || (pair[0].merged_score == pair[1].merged_score && pair[0].id < pair[1].id));
            }
        }
    }
}
