//! Generation request rendering. Everything here is pure and deterministic:
//! the same ticket and snippets always produce byte-identical messages.

use std::fmt::Write as _;

use ticketdesk_core::types::{ChatMessage, FusedHit};

pub const SYSTEM_PROMPT: &str = "You are a domain support knowledge assistant for support agents.
Answer ONLY with grounded facts from the provided CONTEXT.
If the context is insufficient or conflicting, say so and propose the minimal next step.
Return a single valid JSON object that matches the OUTPUT SCHEMA. No extra text.";

pub const OUTPUT_SCHEMA: &str = r#"OUTPUT SCHEMA:
{
  "answer": string,
  "references": string[],  // use "title · section · id"
  "action_required": "no_escalation_needed" | "request_more_information" | "escalate_to_abuse_team" | "escalate_to_billing_team" | "escalate_to_support_level_2"
}"#;

/// Follow-up appended once when the first output fails validation.
pub const CORRECTIVE_INSTRUCTION: &str =
    "Your previous output was not valid JSON per the schema. Reply again with ONLY the JSON object.";

/// Build the message list for one resolution: system rules, the output
/// schema, then the ticket with its numbered context snippets.
pub fn build_prompt(ticket_text: &str, snippets: &[FusedHit]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::system(OUTPUT_SCHEMA),
        ChatMessage::user(build_user_prompt(ticket_text, snippets)),
    ]
}

pub fn build_user_prompt(ticket_text: &str, snippets: &[FusedHit]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TICKET:\n{}", ticket_text.trim());
    out.push_str("\nCONTEXT:\n");
    for (i, hit) in snippets.iter().enumerate() {
        let _ = writeln!(out, "[SNIPPET {}]", i + 1);
        let _ = writeln!(out, "- id: {}", hit.id);
        let _ = writeln!(out, "- title: {}", hit.title());
        let _ = writeln!(out, "- section: {}", hit.section());
        let _ = writeln!(out, "- text: \"{}\"\n", hit.body().trim());
    }
    out.push_str("INSTRUCTIONS:\n");
    out.push_str("1) Use only CONTEXT to answer.\n");
    out.push_str("2) Cite the most relevant 2-5 snippets in \"references\" using \"title · section · id\".\n");
    out.push_str("3) If steps depend on user verification/ownership, ask for it and choose action_required accordingly.\n");
    out.push_str("   If the ticket mentions a domain being suspended/suspension, abuse or policy enforcement, set action_required to escalate_to_abuse_team.\n");
    out.push_str("4) Output MUST be a single JSON object with no surrounding text and match OUTPUT SCHEMA exactly.\n\n");
    out.push_str(OUTPUT_SCHEMA);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketdesk_core::types::{Chunk, Role};

    fn hit(id: &str, title: &str, section: &str, text: &str) -> FusedHit {
        FusedHit {
            id: id.into(),
            merged_score: 1.0,
            semantic: 0.5,
            lexical: 1.0,
            payload: Some(Chunk {
                id: id.into(),
                text: text.into(),
                doc_title: title.into(),
                section: section.into(),
                product: "domains".into(),
                lang: "en".into(),
            }),
        }
    }

    #[test]
    fn renders_ticket_snippets_and_schema() {
        let msgs = build_prompt(
            "  My domain was suspended  ",
            &[hit("a1", "Domain Suspension", "Appeals", "  Appeal within 14 days.  "), hit("b2", "Abuse Policy", "Overview", "x")],
        );
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].content, OUTPUT_SCHEMA);
        let user = &msgs[2].content;
        assert_eq!(msgs[2].role, Role::User);
        assert!(user.starts_with("TICKET:\nMy domain was suspended\n"));
        assert!(user.contains("[SNIPPET 1]\n- id: a1\n- title: Domain Suspension\n- section: Appeals\n- text: \"Appeal within 14 days.\""));
        assert!(user.contains("[SNIPPET 2]\n- id: b2"));
        assert!(user.contains("escalate_to_abuse_team"));
        assert!(user.ends_with(OUTPUT_SCHEMA), "schema restated in the request");
    }

    #[test]
    fn is_deterministic_and_handles_no_context() {
        let a = build_prompt("Where is my invoice?", &[]);
        let b = build_prompt("Where is my invoice?", &[]);
        assert_eq!(a, b);
        assert!(!a[2].content.contains("[SNIPPET"));
    }
}
