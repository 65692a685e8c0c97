//! Domain types shared by the retrieval and resolution crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;

/// Exact-match payload filters (`field -> value`) applied by the semantic index.
///
/// A `BTreeMap` keeps the iteration order stable, which keeps outgoing
/// filter requests byte-identical across calls.
pub type Filters = BTreeMap<String, String>;

/// Separator used inside rendered references: `"title · section · id"`.
pub const REFERENCE_SEPARATOR: char = '·';

/// A knowledge-base chunk as produced by ingestion.
///
/// - `id`: globally unique across the lexical and semantic indices
/// - `doc_title`/`section`: citation metadata (`doc` is accepted on input,
///   which is how older payloads name the title)
/// - `product`/`lang`: filterable facets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    #[serde(alias = "doc", default)]
    pub doc_title: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub lang: String,
}

impl Chunk {
    /// Look up a filterable field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "doc_title" | "doc" => Some(&self.doc_title),
            "section" => Some(&self.section),
            "product" => Some(&self.product),
            "lang" => Some(&self.lang),
            _ => None,
        }
    }

    /// True when every filter matches the corresponding field exactly.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters
            .iter()
            .all(|(k, v)| self.field(k).is_some_and(|f| f == v))
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by both engines.
///
/// `score` is engine-specific but higher is always better. Semantic hits
/// carry their payload; lexical hits never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Chunk>,
}

impl SearchHit {
    pub fn text(id: impl Into<ChunkId>, score: f32) -> Self {
        Self { id: id.into(), score, source: SourceKind::Text, payload: None }
    }

    pub fn vector(id: impl Into<ChunkId>, score: f32, payload: Option<Chunk>) -> Self {
        Self { id: id.into(), score, source: SourceKind::Vector, payload }
    }
}

/// One entry of a fused ranking.
///
/// `semantic` and `lexical` are the raw per-signal scores before
/// normalisation (semantic is backfilled for lexical-only candidates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: ChunkId,
    pub merged_score: f32,
    pub semantic: f32,
    pub lexical: f32,
    pub payload: Option<Chunk>,
}

impl FusedHit {
    pub fn title(&self) -> &str {
        self.payload.as_ref().map_or("", |p| p.doc_title.as_str())
    }

    pub fn section(&self) -> &str {
        self.payload.as_ref().map_or("", |p| p.section.as_str())
    }

    pub fn body(&self) -> &str {
        self.payload.as_ref().map_or("", |p| p.text.as_str())
    }

    /// Render this hit as a citation: `"title · section · id"`.
    pub fn reference(&self) -> String {
        format!(
            "{} {sep} {} {sep} {}",
            self.title(),
            self.section(),
            self.id,
            sep = REFERENCE_SEPARATOR
        )
    }
}

/// The closed set of dispositions a resolution may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    NoEscalationNeeded,
    RequestMoreInformation,
    EscalateToAbuseTeam,
    EscalateToBillingTeam,
    #[serde(rename = "escalate_to_support_level_2")]
    EscalateToSupportLevel2,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::NoEscalationNeeded,
        Action::RequestMoreInformation,
        Action::EscalateToAbuseTeam,
        Action::EscalateToBillingTeam,
        Action::EscalateToSupportLevel2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::NoEscalationNeeded => "no_escalation_needed",
            Action::RequestMoreInformation => "request_more_information",
            Action::EscalateToAbuseTeam => "escalate_to_abuse_team",
            Action::EscalateToBillingTeam => "escalate_to_billing_team",
            Action::EscalateToSupportLevel2 => "escalate_to_support_level_2",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

pub const DEFAULT_TOP_K: usize = 8;
pub const MIN_TICKET_CHARS: usize = 5;

/// A single resolution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Ticket {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Final, governed answer to a ticket.
///
/// An empty `references` list means nothing was retrieved and the answer
/// should be treated as low confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub answer: String,
    pub references: Vec<String>,
    pub action: Action,
}

/// Chat role understood by the generation adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}
