//! ticketdesk-resolve
//!
//! Ticket resolution on top of hybrid retrieval. The orchestrator wraps a
//! generation call with schema validation, reference grounding and the
//! deterministic action rules:
//!
//! `Retrieve -> BuildPrompt -> Generate -> Validate (retry once) -> FilterReferences -> EnforceAction -> Done`

pub mod actions;
pub mod chat;
pub mod grounding;
pub mod orchestrator;
pub mod prompt;
pub mod validate;

pub use actions::enforce_action;
pub use chat::ChatCompletionsClient;
pub use grounding::filter_references;
pub use orchestrator::{ResolverOptions, Stage, TicketResolver, MAX_GENERATION_ATTEMPTS};
pub use prompt::build_prompt;
pub use validate::{parse_response, DraftResponse, ValidationError};
