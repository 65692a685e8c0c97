//! Loads pre-chunked knowledge-base corpora from `*.jsonl` files.
//!
//! Each non-empty line is one [`Chunk`]. Chunking itself happens upstream;
//! this module only reads its output so the host can warm up its indices.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::Chunk;

#[derive(Debug, Default)]
pub struct CorpusLoader {
    limit: Option<usize>,
}

impl CorpusLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `limit` files (sorted by path).
    pub fn with_file_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    pub fn load_dir(&self, dir: &Path) -> Result<Vec<Chunk>> {
        let mut files = self.list_jsonl_files(dir);
        if files.is_empty() {
            warn!(dir = %dir.display(), "no .jsonl files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        for file_path in &files {
            for chunk in self.load_file(file_path)? {
                if seen.insert(chunk.id.clone()) {
                    chunks.push(chunk);
                } else {
                    warn!(id = %chunk.id, file = %file_path.display(), "duplicate chunk id skipped");
                }
            }
        }
        info!(files = files.len(), chunks = chunks.len(), "corpus loaded");
        Ok(chunks)
    }

    pub fn load_file(&self, file_path: &Path) -> Result<Vec<Chunk>> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("reading {}", file_path.display()))?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Chunk>(line)
                    .with_context(|| format!("{}:{}: invalid chunk", file_path.display(), n + 1))
            })
            .collect()
    }

    fn list_jsonl_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
            .collect();
        files.sort();
        files
    }
}
