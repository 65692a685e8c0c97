//! Deterministic action governance. The rules always run and always win
//! over whatever action the model proposed.

use once_cell::sync::Lazy;
use regex::Regex;

use ticketdesk_core::types::{Action, FusedHit};

static ABUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(abuse|malware|phishing|spam|fraud)\b").expect("static pattern"));
static SUSPENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(suspend|suspension|suspended)\b").expect("static pattern"));
static BILLING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(billing|refund|chargeback|invoice)\b").expect("static pattern"));
static IDENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(verification|ownership|identity|id check)\b").expect("static pattern"));

/// Snippet titles containing any of these escalate to the abuse team.
const ABUSE_TITLE_MARKERS: [&str; 2] = ["suspension", "abuse"];

/// What an [`ActionRule`] inspects.
#[derive(Debug, Clone, Copy)]
pub enum RuleTarget {
    Ticket(&'static Lazy<Regex>),
    SnippetTitles(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ActionRule {
    pub name: &'static str,
    pub target: RuleTarget,
    pub action: Action,
}

impl ActionRule {
    fn matches(&self, ticket_text: &str, snippets: &[FusedHit]) -> bool {
        match self.target {
            RuleTarget::Ticket(re) => re.is_match(ticket_text),
            RuleTarget::SnippetTitles(markers) => snippets.iter().any(|s| {
                let title = s.title().to_lowercase();
                markers.iter().any(|m| title.contains(m))
            }),
        }
    }
}

/// Ordered rules; the first match decides.
pub static ACTION_RULES: [ActionRule; 5] = [
    ActionRule { name: "ticket_suspension", target: RuleTarget::Ticket(&SUSPENSION), action: Action::EscalateToAbuseTeam },
    ActionRule { name: "ticket_abuse", target: RuleTarget::Ticket(&ABUSE), action: Action::EscalateToAbuseTeam },
    ActionRule {
        name: "snippet_title_abuse",
        target: RuleTarget::SnippetTitles(&ABUSE_TITLE_MARKERS),
        action: Action::EscalateToAbuseTeam,
    },
    ActionRule { name: "ticket_billing", target: RuleTarget::Ticket(&BILLING), action: Action::EscalateToBillingTeam },
    ActionRule { name: "ticket_identity", target: RuleTarget::Ticket(&IDENTITY), action: Action::EscalateToSupportLevel2 },
];

/// The first matching rule, if any.
pub fn matching_rule(ticket_text: &str, snippets: &[FusedHit]) -> Option<&'static ActionRule> {
    ACTION_RULES.iter().find(|r| r.matches(ticket_text, snippets))
}

/// Final action for a ticket: the first matching rule, otherwise the model's
/// proposal, otherwise [`Action::NoEscalationNeeded`].
pub fn enforce_action(ticket_text: &str, snippets: &[FusedHit], model_action: Option<Action>) -> Action {
    match matching_rule(ticket_text, snippets) {
        Some(rule) => rule.action,
        None => model_action.unwrap_or_default(),
    }
}
