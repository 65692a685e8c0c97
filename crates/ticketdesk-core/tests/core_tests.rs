use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ticketdesk_core::config::{Config, EmbeddingProvider, SemanticBackend};
use ticketdesk_core::corpus::CorpusLoader;
use ticketdesk_core::error::Error;
use ticketdesk_core::types::{Action, Chunk, Filters, FusedHit};

fn write_jsonl(path: &std::path::Path, lines: &[&str]) {
    let mut f = fs::File::create(path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
}

#[test]
fn load_dir_reads_every_jsonl_chunk() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("domains")).unwrap();
    write_jsonl(
        &dir.join("domains/transfer.jsonl"),
        &[
            r#"{"id":"t-1","text":"Unlock the domain first.","doc_title":"Transfers","section":"Unlock","product":"domains","lang":"en"}"#,
            "",
            r#"{"id":"t-2","text":"Request the auth code.","doc":"Transfers","section":"Auth code"}"#,
        ],
    );
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let chunks = CorpusLoader::new().load_dir(dir).expect("load");
    assert_eq!(chunks.len(), 2, "blank lines and non-jsonl files are skipped");
    assert_eq!(chunks[1].doc_title, "Transfers", "legacy `doc` key maps to doc_title");
    assert_eq!(chunks[1].product, "", "missing facets default to empty");
}

#[test]
fn load_dir_skips_duplicate_ids_and_honours_limit() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_jsonl(&dir.join("a.jsonl"), &[r#"{"id":"x","text":"alpha"}"#, r#"{"id":"x","text":"again"}"#]);
    write_jsonl(&dir.join("b.jsonl"), &[r#"{"id":"y","text":"bravo"}"#]);

    let all = CorpusLoader::new().load_dir(dir).expect("load");
    assert_eq!(all.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(all[0].text, "alpha", "first occurrence wins");

    let limited = CorpusLoader::with_file_limit(1).load_dir(dir).expect("load limited");
    assert_eq!(limited.len(), 1);
}

#[test]
fn load_file_reports_line_of_bad_chunk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.jsonl");
    write_jsonl(&path, &[r#"{"id":"ok","text":"fine"}"#, "{not json"]);
    let err = CorpusLoader::new().load_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("bad.jsonl:2"));
}

#[test]
fn config_defaults_then_file_overrides() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[retrieval]\nalpha = 0.5\ntop_k = 4\ncandidate_multiplier = 4\n\n[semantic]\nbackend = \"qdrant\"\nurl = \"http://qdrant:6333\"\ncollection = \"kb\"\ntimeout_secs = 2\n",
    )
    .unwrap();
    let config = Config::load_for_env(tmp.path(), "test").expect("config");
    let s = config.settings().expect("settings");
    assert!((s.retrieval.alpha - 0.5).abs() < f32::EPSILON);
    assert_eq!(s.retrieval.top_k, 4);
    assert_eq!(s.semantic.backend, SemanticBackend::Qdrant);
    assert_eq!(s.embedding.provider, EmbeddingProvider::Hash, "untouched sections keep defaults");
    assert_eq!(config.get::<String>("semantic.collection").unwrap(), "kb");
}

#[test]
fn config_resolves_relative_paths_against_its_base() {
    let tmp = TempDir::new().unwrap();
    let config = Config::load_for_env(tmp.path(), "test").expect("config");
    assert_eq!(config.resolve_path("data/corpus"), tmp.path().join("data/corpus"));
    assert_eq!(config.resolve_path("/abs/corpus"), std::path::PathBuf::from("/abs/corpus"));
}

#[test]
fn config_rejects_alpha_out_of_range() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\nalpha = 1.5\n").unwrap();
    let err = Config::load_for_env(tmp.path(), "test").err().expect("alpha 1.5 rejected");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(m)) if m.contains("alpha")));
}

#[test]
fn prod_refuses_development_adapters() {
    let tmp = TempDir::new().unwrap();
    let err = Config::load_for_env(tmp.path(), "prod").err().expect("dev adapters rejected in prod");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(_))));
}

#[test]
fn action_wire_names_are_stable() {
    let names: Vec<String> = Action::ALL
        .iter()
        .map(|a| serde_json::to_value(a).unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "no_escalation_needed",
            "request_more_information",
            "escalate_to_abuse_team",
            "escalate_to_billing_team",
            "escalate_to_support_level_2",
        ]
    );
    assert_eq!("escalate_to_support_level_2".parse::<Action>().unwrap(), Action::EscalateToSupportLevel2);
    assert!("escalate_to_everyone".parse::<Action>().is_err());
}

#[test]
fn fused_hit_reference_format() {
    let hit = FusedHit {
        id: "a1".into(),
        merged_score: 1.0,
        semantic: 0.9,
        lexical: 3.2,
        payload: Some(Chunk {
            id: "a1".into(),
            text: "body".into(),
            doc_title: "Domain Suspension".into(),
            section: "Appeals".into(),
            product: "domains".into(),
            lang: "en".into(),
        }),
    };
    assert_eq!(hit.reference(), "Domain Suspension · Appeals · a1");
}

#[test]
fn chunk_filters_match_exactly() {
    let chunk = Chunk {
        id: "c".into(),
        text: "t".into(),
        doc_title: "T".into(),
        section: "S".into(),
        product: "domains".into(),
        lang: "en".into(),
    };
    let mut filters = Filters::new();
    assert!(chunk.matches(&filters), "no filters match everything");
    filters.insert("product".into(), "domains".into());
    assert!(chunk.matches(&filters));
    filters.insert("lang".into(), "fr".into());
    assert!(!chunk.matches(&filters));
    let unknown: Filters = [("colour".to_string(), "red".to_string())].into_iter().collect();
    assert!(!chunk.matches(&unknown), "unknown fields never match");
}
