use std::collections::HashMap;
use std::hash::Hasher;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use ticketdesk_core::config::SemanticConfig;
use ticketdesk_core::traits::VectorIndexer;
use ticketdesk_core::types::{Chunk, ChunkId, Filters, SearchHit};

use crate::VectorWriter;

/// Semantic index served by a Qdrant collection over its REST API.
///
/// Qdrant only accepts unsigned integers and UUIDs as point ids, so chunk
/// ids are mapped through [`point_id`] and the chunk id itself travels in
/// the payload under `id`.
pub struct QdrantIndex {
	client: Client,
	url: String,
	collection: String,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
	result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
	id: Value,
	score: f32,
	#[serde(default)]
	payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct Record {
	id: Value,
	#[serde(default)]
	payload: Option<Map<String, Value>>,
	#[serde(default)]
	vector: Option<Value>,
}

impl QdrantIndex {
	pub fn new(url: &str, collection: &str, timeout: Duration) -> Result<Self> {
		let client = Client::builder().timeout(timeout).build().context("building qdrant HTTP client")?;
		Ok(Self { client, url: url.trim_end_matches('/').to_string(), collection: collection.to_string() })
	}

	pub fn from_config(cfg: &SemanticConfig) -> Result<Self> {
		Self::new(&cfg.url, &cfg.collection, Duration::from_secs(cfg.timeout_secs))
	}

	fn collection_url(&self) -> String {
		format!("{}/collections/{}", self.url, self.collection)
	}

	/// Create the collection with cosine distance unless it already exists.
	pub async fn ensure_collection(&self, dim: usize) -> Result<()> {
		let url = self.collection_url();
		let existing = self.client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
		if existing.status().is_success() {
			debug!(collection = %self.collection, "qdrant collection exists");
			return Ok(());
		}
		if existing.status() != StatusCode::NOT_FOUND {
			return Err(status_error("qdrant collection lookup", existing).await);
		}
		let body = json!({ "vectors": { "size": dim, "distance": "Cosine" } });
		let created = self.client.put(&url).json(&body).send().await.with_context(|| format!("PUT {url}"))?;
		if !created.status().is_success() {
			return Err(status_error("qdrant create collection", created).await);
		}
		info!(collection = %self.collection, dim, "qdrant collection created");
		Ok(())
	}

	pub async fn is_healthy(&self) -> bool {
		match self.client.get(format!("{}/collections", self.url)).send().await {
			Ok(resp) => resp.status().is_success(),
			Err(e) => {
				warn!(error = %e, "qdrant health check failed");
				false
			}
		}
	}

	async fn retrieve(&self, ids: &[ChunkId], with_vector: bool) -> Result<Vec<(ChunkId, Record)>> {
		if ids.is_empty() {
			return Ok(vec![]);
		}
		let by_point: HashMap<String, &ChunkId> = ids.iter().map(|id| (point_key(&point_id(id)), id)).collect();
		let url = format!("{}/points", self.collection_url());
		let body = json!({
			"ids": ids.iter().map(|id| point_id(id)).collect::<Vec<_>>(),
			"with_payload": true,
			"with_vector": with_vector,
		});
		let resp = self.client.post(&url).json(&body).send().await.with_context(|| format!("POST {url}"))?;
		if !resp.status().is_success() {
			return Err(status_error("qdrant retrieve", resp).await);
		}
		let parsed: QdrantResponse<Vec<Record>> = resp.json().await.context("decoding qdrant retrieve response")?;
		Ok(parsed
			.result
			.into_iter()
			.filter_map(|r| {
				let id = payload_id(r.payload.as_ref()).or_else(|| by_point.get(&point_key(&r.id)).map(|id| (*id).clone()))?;
				Some((id, r))
			})
			.collect())
	}
}

#[async_trait]
impl VectorWriter for QdrantIndex {
	async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
		if chunks.len() != vectors.len() {
			return Err(anyhow!("{} chunks but {} vectors", chunks.len(), vectors.len()));
		}
		if chunks.is_empty() {
			return Ok(());
		}
		let points: Vec<Value> = chunks
			.iter()
			.zip(vectors)
			.map(|(chunk, vector)| json!({ "id": point_id(&chunk.id), "vector": vector, "payload": chunk }))
			.collect();
		let url = format!("{}/points?wait=true", self.collection_url());
		let resp = self.client.put(&url).json(&json!({ "points": points })).send().await.with_context(|| format!("PUT {url}"))?;
		if !resp.status().is_success() {
			return Err(status_error("qdrant upsert", resp).await);
		}
		debug!(points = chunks.len(), collection = %self.collection, "qdrant upsert");
		Ok(())
	}
}

#[async_trait]
impl VectorIndexer for QdrantIndex {
	async fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> Result<Vec<SearchHit>> {
		if k == 0 {
			return Ok(vec![]);
		}
		let url = format!("{}/points/search", self.collection_url());
		let resp = self
			.client
			.post(&url)
			.json(&search_body(query_vec, k, filters))
			.send()
			.await
			.with_context(|| format!("POST {url}"))?;
		if !resp.status().is_success() {
			return Err(status_error("qdrant search", resp).await);
		}
		let parsed: QdrantResponse<Vec<ScoredPoint>> = resp.json().await.context("decoding qdrant search response")?;
		let hits: Vec<SearchHit> = parsed
			.result
			.into_iter()
			.map(|p| {
				let id = payload_id(p.payload.as_ref()).unwrap_or_else(|| point_key(&p.id));
				let payload = p.payload.and_then(|m| chunk_from_payload(&id, m));
				SearchHit::vector(id, p.score, payload)
			})
			.collect();
		debug!(hits = hits.len(), k, filters = filters.len(), "qdrant search");
		Ok(hits)
	}

	async fn fetch_vectors(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, Vec<f32>>> {
		let records = self.retrieve(ids, true).await?;
		Ok(records
			.into_iter()
			.filter_map(|(id, r)| {
				let vector: Vec<f32> = serde_json::from_value(r.vector?).ok()?;
				Some((id, vector))
			})
			.collect())
	}

	async fn fetch_payloads(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, Chunk>> {
		let records = self.retrieve(ids, false).await?;
		Ok(records
			.into_iter()
			.filter_map(|(id, r)| {
				let chunk = chunk_from_payload(&id, r.payload?)?;
				Some((id, chunk))
			})
			.collect())
	}
}

async fn status_error(what: &str, resp: Response) -> anyhow::Error {
	let status = resp.status();
	let body = resp.text().await.unwrap_or_default();
	anyhow!("{what} returned {status}: {body}")
}

/// Request body for `POST /collections/{name}/points/search`.
pub fn search_body(query_vec: &[f32], k: usize, filters: &Filters) -> Value {
	let mut body = json!({ "vector": query_vec, "limit": k, "with_payload": true });
	if !filters.is_empty() {
		let must: Vec<Value> = filters.iter().map(|(key, value)| json!({ "key": key, "match": { "value": value } })).collect();
		body["filter"] = json!({ "must": must });
	}
	body
}

/// Qdrant point id for a chunk id: UUIDs and unsigned integers pass through,
/// anything else is hashed to a stable `u64`.
pub fn point_id(chunk_id: &str) -> Value {
	if is_uuid(chunk_id) {
		return Value::String(chunk_id.to_ascii_lowercase());
	}
	if let Ok(n) = chunk_id.parse::<u64>() {
		return Value::from(n);
	}
	let mut hasher = XxHash64::with_seed(0);
	hasher.write(chunk_id.as_bytes());
	Value::from(hasher.finish())
}

fn point_key(id: &Value) -> String {
	match id {
		Value::String(s) => s.to_ascii_lowercase(),
		other => other.to_string(),
	}
}

fn is_uuid(s: &str) -> bool {
	s.len() == 36
		&& s.char_indices().all(|(i, c)| match i {
			8 | 13 | 18 | 23 => c == '-',
			_ => c.is_ascii_hexdigit(),
		})
}

fn payload_id(payload: Option<&Map<String, Value>>) -> Option<ChunkId> {
	payload?.get("id")?.as_str().map(str::to_string)
}

/// Decode a stored payload into a [`Chunk`]. Payloads written without an
/// `id` take the chunk id they were looked up by.
pub fn chunk_from_payload(id: &str, mut payload: Map<String, Value>) -> Option<Chunk> {
	payload.entry("id").or_insert_with(|| Value::String(id.to_string()));
	match serde_json::from_value::<Chunk>(Value::Object(payload)) {
		Ok(chunk) => Some(chunk),
		Err(e) => {
			warn!(id, error = %e, "qdrant payload is not a chunk");
			None
		}
	}
}
