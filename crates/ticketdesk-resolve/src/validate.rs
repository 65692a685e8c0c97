use serde::Deserialize;
use thiserror::Error;

use ticketdesk_core::types::Action;

/// Why a generation output was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("output is not a JSON object matching the schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("answer is empty")]
    EmptyAnswer,
}

/// A schema-valid generation output, before grounding and action governance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DraftResponse {
    pub answer: String,
    pub references: Vec<String>,
    #[serde(alias = "action_required", default)]
    pub action: Option<Action>,
}

/// Parse `raw` as exactly one JSON object with a non-empty `answer`, a
/// `references` string array and an optional `action` (also accepted as
/// `action_required`) drawn from the fixed action set.
pub fn parse_response(raw: &str) -> Result<DraftResponse, ValidationError> {
    let draft: DraftResponse = serde_json::from_str(raw.trim())?;
    if draft.answer.trim().is_empty() {
        return Err(ValidationError::EmptyAnswer);
    }
    Ok(draft)
}
