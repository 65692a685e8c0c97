use std::sync::Arc;
use std::thread;

use ticketdesk_text::LexicalIndex;

fn kb() -> Vec<(&'static str, &'static str)> {
    vec![
        ("susp-1", "Domain suspension happens after abuse reports. Appeal a suspension through the abuse desk."),
        ("xfer-1", "To transfer a domain, unlock it and request the auth code from the current registrar."),
        ("bill-1", "Refunds for domain renewals are issued to the original payment method within 5 days."),
        ("dns-1", "Update DNS records from the zone editor. Changes propagate within 24 hours."),
    ]
}

#[test]
fn bm25_ranks_the_matching_document_first() {
    let index = LexicalIndex::new().expect("index");
    assert_eq!(index.build(kb()).expect("build"), 4);

    let hits = index.search("why was my domain suspension triggered", 10).expect("search");
    assert_eq!(hits[0].id, "susp-1");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores are descending");
    }
    assert!(hits.iter().all(|h| h.payload.is_none()), "lexical hits never carry payload");
}

#[test]
fn search_is_case_insensitive_and_punctuation_tolerant() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    let hits = index.search("AUTH-CODE???", 3).unwrap();
    assert_eq!(hits[0].id, "xfer-1");
}

#[test]
fn empty_index_and_empty_query_return_nothing() {
    let index = LexicalIndex::new().unwrap();
    assert!(index.search("domain", 5).unwrap().is_empty());
    index.build(kb()).unwrap();
    assert!(index.search("   ?! ", 5).unwrap().is_empty());
    assert!(index.search("domain", 0).unwrap().is_empty());
    assert!(index.search("kubernetes", 5).unwrap().is_empty(), "no shared tokens, no hits");
}

#[test]
fn k_truncates_results() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    assert_eq!(index.search("domain", 2).unwrap().len(), 2);
}

#[test]
fn oversized_k_is_capped_at_corpus_size() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    assert_eq!(index.search("domain", usize::MAX).unwrap().len(), 3);
    assert_eq!(index.search("domain", usize::MAX / 4).unwrap().len(), 3);
}

#[test]
fn add_makes_document_searchable_and_replaces_same_id() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    index.add("whois-1", "WHOIS privacy hides registrant contact details.").unwrap();
    assert_eq!(index.len().unwrap(), 5);
    assert_eq!(index.search("whois privacy", 1).unwrap()[0].id, "whois-1");

    index.add("whois-1", "Registrant verification emails expire after 15 days.").unwrap();
    assert_eq!(index.len().unwrap(), 5, "same id is replaced, not duplicated");
    assert!(index.search("whois privacy", 5).unwrap().iter().all(|h| h.id != "whois-1"));
    assert_eq!(index.search("registrant verification", 1).unwrap()[0].id, "whois-1");
}

#[test]
fn build_replaces_entire_corpus() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    index.build(vec![("only-1", "glue records for nameservers")]).unwrap();
    assert_eq!(index.len().unwrap(), 1);
    assert!(index.search("domain", 10).unwrap().is_empty());
}

#[test]
fn snapshot_keeps_its_view_across_mutations() {
    let index = LexicalIndex::new().unwrap();
    index.build(kb()).unwrap();
    let before = index.snapshot().unwrap();

    index.add("late-1", "domain parking pages").unwrap();
    index.build(vec![("other", "something else")]).unwrap();

    assert_eq!(before.len(), 4);
    assert!(before.search("parking", 5).unwrap().is_empty());
    assert_eq!(before.search("transfer", 1).unwrap()[0].id, "xfer-1");
    assert_eq!(index.snapshot().unwrap().len(), 1);
}

#[test]
fn concurrent_readers_see_whole_generations() {
    let index = Arc::new(LexicalIndex::new().unwrap());
    index.build(kb()).unwrap();

    let big: Vec<(String, String)> = (0..200).map(|i| (format!("gen2-{i}"), format!("domain record {i}"))).collect();
    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for _ in 0..3 {
                index.build(big.clone()).unwrap();
                index.build(kb()).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..50 {
                    let n = index.snapshot().unwrap().len();
                    assert!(n == 4 || n == 200, "observed partial generation of {n} docs");
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}
