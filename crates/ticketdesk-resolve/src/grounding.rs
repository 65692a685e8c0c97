use std::collections::HashSet;

use tracing::debug;

use ticketdesk_core::types::{FusedHit, REFERENCE_SEPARATOR};

/// Number of snippets cited when none of the model's references survive.
pub const FALLBACK_REFERENCES: usize = 2;

/// Keep the references whose trailing id (after the last `·`) names a
/// retrieved snippet. With no survivors, cite the first snippets instead;
/// with no snippets the result is empty.
pub fn filter_references(references: &[String], snippets: &[FusedHit]) -> Vec<String> {
    let allowed: HashSet<&str> = snippets.iter().map(|s| s.id.as_str()).collect();
    let kept: Vec<String> = references
        .iter()
        .filter(|r| {
            r.rsplit_once(REFERENCE_SEPARATOR)
                .is_some_and(|(_, id)| allowed.contains(id.trim()))
        })
        .cloned()
        .collect();
    if !kept.is_empty() {
        return kept;
    }
    debug!(proposed = references.len(), "no grounded references, citing top snippets");
    snippets.iter().take(FALLBACK_REFERENCES).map(FusedHit::reference).collect()
}
