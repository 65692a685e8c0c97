use std::fmt;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use ticketdesk_core::config::Settings;
use ticketdesk_core::error::{Error, Result};
use ticketdesk_core::traits::{Generator, SearchEngine};
use ticketdesk_core::types::{ChatMessage, Filters, FusedHit, Resolution, Ticket, MIN_TICKET_CHARS};

use crate::actions::enforce_action;
use crate::grounding::{filter_references, FALLBACK_REFERENCES};
use crate::prompt::{build_prompt, CORRECTIVE_INSTRUCTION};
use crate::validate::{parse_response, DraftResponse};

/// Original call plus one corrective retry.
pub const MAX_GENERATION_ATTEMPTS: usize = 2;

/// Pipeline stages, in order. Every successful resolution passes through
/// all of them; `EnforceAction` is never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieve,
    BuildPrompt,
    Generate,
    Validate,
    FilterReferences,
    EnforceAction,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Retrieve => "retrieve",
            Stage::BuildPrompt => "build_prompt",
            Stage::Generate => "generate",
            Stage::Validate => "validate",
            Stage::FilterReferences => "filter_references",
            Stage::EnforceAction => "enforce_action",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub alpha: f32,
    pub filters: Filters,
    pub generation_timeout: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { alpha: 0.7, filters: Filters::new(), generation_timeout: Duration::from_secs(30) }
    }
}

impl ResolverOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            alpha: settings.retrieval.alpha,
            filters: settings.retrieval.filters.clone(),
            generation_timeout: Duration::from_secs(settings.generation.timeout_secs),
        }
    }
}

/// Resolves tickets end to end: retrieve, prompt, generate, validate (with
/// one corrective retry), ground references, enforce the action.
///
/// Holds no per-ticket state; concurrent `resolve` calls are independent.
pub struct TicketResolver<S, G>
where
    S: SearchEngine,
    G: Generator,
{
    search: S,
    generator: G,
    options: ResolverOptions,
}

impl<S, G> TicketResolver<S, G>
where
    S: SearchEngine,
    G: Generator,
{
    pub fn new(search: S, generator: G) -> Self {
        Self { search, generator, options: ResolverOptions::default() }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    #[instrument(skip(self, ticket), fields(top_k = ticket.top_k))]
    pub async fn resolve(&self, ticket: &Ticket) -> Result<Resolution> {
        let text = ticket.text.trim();
        if text.chars().count() < MIN_TICKET_CHARS {
            return Err(Error::InvalidRequest(format!("ticket text must be at least {MIN_TICKET_CHARS} characters")));
        }
        if ticket.top_k == 0 {
            return Err(Error::InvalidRequest("top_k must be greater than 0".into()));
        }

        debug!(stage = %Stage::Retrieve);
        let hits = self.search.search_merged(text, ticket.top_k, &self.options.filters, self.options.alpha).await?;
        let snippets = usable_snippets(&hits);
        if hits.is_empty() {
            info!("no snippets retrieved, answer will be ungrounded");
        }

        debug!(stage = %Stage::BuildPrompt, snippets = snippets.len());
        let messages = build_prompt(text, &snippets);

        let draft = self.generate_validated(&messages).await?;

        debug!(stage = %Stage::FilterReferences, proposed = draft.references.len());
        let references = ground_references(&draft.references, &snippets, &hits);

        debug!(stage = %Stage::EnforceAction, model_action = ?draft.action);
        let action = enforce_action(text, &snippets, draft.action);

        info!(stage = %Stage::Done, %action, references = references.len(), "ticket resolved");
        Ok(Resolution { answer: draft.answer.trim().to_string(), references, action })
    }

    /// Generate and validate, retrying once with a corrective instruction.
    /// Transport failures and timeouts end the pipeline without a retry.
    async fn generate_validated(&self, messages: &[ChatMessage]) -> Result<DraftResponse> {
        let mut conversation = messages.to_vec();
        let mut attempt = 1;
        loop {
            debug!(stage = %Stage::Generate, attempt);
            let raw = self.generate(&conversation).await?;
            debug!(stage = %Stage::Validate, attempt);
            match parse_response(&raw) {
                Ok(draft) => return Ok(draft),
                Err(e) if attempt < MAX_GENERATION_ATTEMPTS => {
                    warn!(attempt, error = %e, "generation output rejected, retrying");
                    conversation = messages.to_vec();
                    conversation.push(ChatMessage::system(CORRECTIVE_INSTRUCTION));
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "generation output rejected");
                    return Err(Error::MalformedGenerationOutput { attempts: attempt, reason: e.to_string() });
                }
            }
        }
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let timeout = self.options.generation_timeout;
        match tokio::time::timeout(timeout, self.generator.complete(messages)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(Error::GenerationUnavailable(format!("{e:#}"))),
            Err(_) => Err(Error::Timeout {
                stage: "generate",
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Hits usable as generation context. Hits whose payload could not be
/// fetched carry no text or title and are left out.
fn usable_snippets(hits: &[FusedHit]) -> Vec<FusedHit> {
    let usable: Vec<FusedHit> = hits.iter().filter(|h| h.payload.is_some()).cloned().collect();
    if usable.len() < hits.len() {
        warn!(dropped = hits.len() - usable.len(), "retrieved hits without payload excluded from context");
    }
    usable
}

/// References are never empty while anything was retrieved: when no hit had
/// a usable payload, the top raw hits are cited by id.
fn ground_references(proposed: &[String], snippets: &[FusedHit], hits: &[FusedHit]) -> Vec<String> {
    let references = filter_references(proposed, snippets);
    if references.is_empty() && !hits.is_empty() {
        return hits.iter().take(FALLBACK_REFERENCES).map(FusedHit::reference).collect();
    }
    references
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(Stage::FilterReferences.to_string(), "filter_references");
        assert_eq!(Stage::Done.to_string(), "done");
    }

    fn bare(id: &str) -> FusedHit {
        FusedHit { id: id.into(), merged_score: 1.0, semantic: 0.0, lexical: 1.0, payload: None }
    }

    #[test]
    fn payloadless_hits_are_still_cited() {
        let hits = vec![bare("lex-1"), bare("lex-2"), bare("lex-3")];
        let snippets = usable_snippets(&hits);
        assert!(snippets.is_empty());
        assert_eq!(ground_references(&["X · Y · zz".to_string()], &snippets, &hits), vec![" ·  · lex-1", " ·  · lex-2"]);
        assert!(ground_references(&[], &[], &[]).is_empty());
    }

    #[test]
    fn options_follow_settings() {
        let mut settings = Settings::default();
        settings.retrieval.alpha = 0.25;
        settings.generation.timeout_secs = 3;
        let o = ResolverOptions::from_settings(&settings);
        assert!((o.alpha - 0.25).abs() < f32::EPSILON);
        assert_eq!(o.generation_timeout, Duration::from_secs(3));
    }
}
