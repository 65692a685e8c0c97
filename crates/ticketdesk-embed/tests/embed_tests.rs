use ticketdesk_core::config::EmbeddingConfig;
use ticketdesk_core::traits::Embedder;
use ticketdesk_embed::{default_embedder, dot, HashEmbedder};

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let cfg = EmbeddingConfig { dim: 256, ..EmbeddingConfig::default() };
    let embedder = default_embedder(&cfg).expect("embedder");
    assert_eq!(embedder.dim(), 256);

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 256);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn shared_vocabulary_scores_higher_than_disjoint() {
    let e = HashEmbedder::new(512);
    let q = e.embed_text("domain suspended for abuse");
    let near = e.embed_text("Why a domain gets suspended after abuse reports");
    let far = e.embed_text("refund to the original payment method");
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[test]
fn case_and_punctuation_do_not_change_the_vector() {
    let e = HashEmbedder::new(64);
    assert_eq!(e.embed_text("Auth-Code?"), e.embed_text("auth code"));
}

#[tokio::test]
async fn empty_batch_yields_no_vectors() {
    let e = HashEmbedder::new(8);
    assert!(e.embed_batch(&[]).await.unwrap().is_empty());
}
