//! ticketdesk-embed
//!
//! Embedders behind [`ticketdesk_core::traits::Embedder`]: a deterministic
//! hashing embedder for development and tests, and an HTTP client for
//! OpenAI-compatible embedding endpoints. Every vector is unit length.

use anyhow::Result;
use tracing::info;

use ticketdesk_core::config::{EmbeddingConfig, EmbeddingProvider};
use ticketdesk_core::traits::Embedder;

pub mod hash;
pub mod openai;
pub mod pool;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::{dot, l2_normalize};

/// Build the embedder selected by `cfg`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` (or `true`) forces the hashing embedder
/// regardless of the configured provider.
pub fn default_embedder(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake || cfg.provider == EmbeddingProvider::Hash {
        info!(dim = cfg.dim, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(cfg.dim)));
    }
    info!(model = %cfg.model, base_url = %cfg.base_url, "using OpenAI-compatible embedder");
    Ok(Box::new(OpenAiEmbedder::from_config(cfg)?))
}
